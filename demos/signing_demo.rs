//! # Delegated Signing Demo
//!
//! Walks through signing with a certified ephemeral subkey, synchronously
//! and through an external certifier.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example signing_demo
//! ```

use subkey_core::crypto::certify;
use subkey_core::{
    seal_master_key, CertificationReply, Envelope, MasterKeySource, SubkeyConfig, SubkeyContext,
};

fn main() {
    println!("=== Subkey Core: Delegated Signing Demo ===\n");

    let ctx = SubkeyContext::new(SubkeyConfig::default());

    // Step 1: Master key
    println!("Step 1: Loading the master key...");

    let seed: [u8; 32] = [42u8; 32]; // In production, load from secure storage
    let master = MasterKeySource::from(seed);
    let public = master.public_key().expect("Failed to derive master public key");

    println!("  Master public key (hex): {}", hex::encode(public));
    println!();

    // Step 2: Explain the envelope
    println!("Step 2: Understanding delegated signatures");
    println!();
    println!("  ┌─────────────────────────────────────────────────────────────┐");
    println!("  │                   DELEGATION FLOW                           │");
    println!("  ├─────────────────────────────────────────────────────────────┤");
    println!("  │                                                             │");
    println!("  │  ONCE PER MASTER KEY:                                      │");
    println!("  │                                                             │");
    println!("  │    Ephemeral ─► Master ─► keysig                           │");
    println!("  │    public key   Sign                                       │");
    println!("  │                                                             │");
    println!("  │  PER MESSAGE:                                              │");
    println!("  │                                                             │");
    println!("  │    SHA-224(Message) ─► Ephemeral Sign ─► sig               │");
    println!("  │                                                             │");
    println!("  │  ENVELOPE: {{ key, keysig, sig }}                            │");
    println!("  │                                                             │");
    println!("  │  The master key signs once; every message after that is    │");
    println!("  │  signed with the cheap, disposable subkey.                 │");
    println!("  │                                                             │");
    println!("  └─────────────────────────────────────────────────────────────┘");
    println!();

    // Step 3: Sign
    println!("Step 3: Signing a message...");

    let message = b"This message was sent by me and has not been tampered with.";
    println!("  Message: \"{}\"", String::from_utf8_lossy(message));

    let signature = ctx.sign(&master, message).expect("Failed to sign");
    let envelope = Envelope::from_bytes(&signature).expect("Failed to decode envelope");

    println!("  Envelope length: {} bytes", signature.len());
    println!("  Subkey (hex):    {}", hex::encode(&envelope.subkey));
    println!("  Keysig (hex):    {}...", hex::encode(&envelope.certification[..16]));
    println!("  Sig (hex):       {}...", hex::encode(&envelope.signature[..16]));
    println!();

    // Step 4: Verify
    println!("Step 4: Verifying the signature...");

    if ctx.verify(&public, &signature, message) {
        println!("  [OK] Signature is valid!");
    } else {
        println!("  [FAILED] Signature verification failed!");
    }
    println!();

    // Step 5: Forgery detection
    println!("Step 5: Forgery detection...");

    let tampered = b"This message was MODIFIED by an attacker!";
    if ctx.verify(&public, &signature, tampered) {
        println!("  [FAILED] Tampered message was accepted!");
    } else {
        println!("  [OK] Tampered message detected - signature invalid!");
    }

    let stranger = MasterKeySource::from([99u8; 32])
        .public_key()
        .expect("Failed to derive stranger public key");
    if ctx.verify(&stranger, &signature, message) {
        println!("  [FAILED] Wrong master key was accepted!");
    } else {
        println!("  [OK] Wrong master key detected - subkey not certified!");
    }
    println!();

    // Step 6: Passphrase-sealed master key
    println!("Step 6: Signing with a passphrase-sealed master key...");

    let sealed = seal_master_key(&seed, "correct horse").expect("Failed to seal key");
    let protected = MasterKeySource::with_passphrase(sealed, "correct horse");
    let sig = ctx.sign(&protected, message).expect("Failed to sign");
    println!(
        "  Valid under the same public key: {}",
        if ctx.verify(&public, &sig, message) { "[OK]" } else { "[FAILED]" }
    );
    println!();

    // Step 7: External certifier
    println!("Step 7: Signing through an external certifier...");

    let certifier = |master: &MasterKeySource, subkey: &[u8], reply: CertificationReply| {
        println!("  Certifier asked to certify {}", hex::encode(subkey));
        reply.resolve(certify(master, subkey));
    };

    let messages = [
        "Friend request accepted",
        "New message received",
        "Profile updated",
    ];

    for (i, msg) in messages.iter().enumerate() {
        let pending = ctx
            .sign_async(&master, msg.as_bytes(), &certifier)
            .expect("Failed to start signing");
        let sig = futures::executor::block_on(pending).expect("Certification failed");
        let valid = futures::executor::block_on(ctx.verify_async(&public, &sig, msg.as_bytes()));
        println!("  Message {}: \"{}\"", i + 1, msg);
        println!("    Valid: {}", if valid { "[OK]" } else { "[FAILED]" });
    }
    println!();

    // Step 8: Rotation
    println!("Step 8: Rotating subkeys...");

    ctx.clear_keys();
    let rotated = Envelope::from_bytes(&ctx.sign(&master, message).expect("Failed to sign"))
        .expect("Failed to decode envelope");
    println!("  New subkey (hex): {}", hex::encode(&rotated.subkey));
    println!(
        "  Old signature still valid: {}",
        if ctx.verify(&public, &signature, message) { "[OK]" } else { "[FAILED]" }
    );
    println!();

    println!("=== Example Complete ===");
}
