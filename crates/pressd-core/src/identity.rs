// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Identity generation: hash-based, RFC 4122 shaped UUIDs for the system,
// its printers, and their jobs.
//
// The composition key is hashed with SHA-256 and sixteen digest bytes are
// packed into a version 3 layout.  Printer UUIDs carry no randomness so they
// stay stable across restarts; job UUIDs add a random salt so a job number
// reused on a later run never yields the same identity.

use sha2::{Digest, Sha256};
use uuid::{Builder, Uuid};

/// Digest byte positions copied into the 16 UUID bytes.
const DIGEST_PICK: [usize; 16] = [0, 1, 3, 4, 5, 6, 10, 11, 15, 16, 20, 21, 25, 26, 30, 31];

/// What an identity is being derived for.
#[derive(Debug, Clone, Copy)]
pub enum IdentityKey<'a> {
    /// The system itself: four independent random 32-bit quantities.
    System,
    /// A printer: `(system uuid, port, printer name)`.
    Printer {
        system_uuid: &'a str,
        port: u16,
        printer_name: &'a str,
    },
    /// A job: `(system uuid, port, printer name, job id, random salt)`.
    Job {
        system_uuid: &'a str,
        port: u16,
        printer_name: &'a str,
        job_id: u32,
    },
}

impl IdentityKey<'_> {
    /// Build the text that gets hashed.
    fn composition(&self) -> String {
        match *self {
            Self::System => format!(
                "pressd-system:{:08x}:{:08x}:{:08x}:{:08x}",
                rand::random::<u32>(),
                rand::random::<u32>(),
                rand::random::<u32>(),
                rand::random::<u32>()
            ),
            Self::Printer {
                system_uuid,
                port,
                printer_name,
            } => format!("pressd-printer:{system_uuid}:{port}:{printer_name}"),
            Self::Job {
                system_uuid,
                port,
                printer_name,
                job_id,
            } => format!(
                "pressd-job:{system_uuid}:{port}:{printer_name}:{job_id}:{:08x}",
                rand::random::<u32>()
            ),
        }
    }
}

/// Derive a UUID for `key`.
pub fn make_uuid(key: IdentityKey<'_>) -> Uuid {
    let digest = Sha256::digest(key.composition().as_bytes());

    let mut bytes = [0u8; 16];
    for (slot, &pick) in bytes.iter_mut().zip(DIGEST_PICK.iter()) {
        *slot = digest[pick];
    }

    // Forces version nibble 3 and the RFC 4122 variant bits.
    Builder::from_md5_bytes(bytes).into_uuid()
}

/// A fresh, random system UUID in `urn:uuid:` form.
pub fn system_uuid() -> String {
    make_uuid(IdentityKey::System).urn().to_string()
}

/// The stable UUID for a printer, in `urn:uuid:` form.
pub fn printer_uuid(system_uuid: &str, port: u16, printer_name: &str) -> String {
    make_uuid(IdentityKey::Printer {
        system_uuid,
        port,
        printer_name,
    })
    .urn()
    .to_string()
}

/// A salted UUID for a job, in `urn:uuid:` form.
pub fn job_uuid(system_uuid: &str, port: u16, printer_name: &str, job_id: u32) -> String {
    make_uuid(IdentityKey::Job {
        system_uuid,
        port,
        printer_name,
        job_id,
    })
    .urn()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSTEM: &str = "urn:uuid:6f1b7ad2-0c4e-3d11-9a6b-1f2e3d4c5b6a";

    /// Version and variant nibbles from the hyphenated form.
    fn nibbles(urn: &str) -> (char, char) {
        let hyphenated = urn.trim_start_matches("urn:uuid:");
        let chars: Vec<char> = hyphenated.chars().collect();
        (chars[14], chars[19])
    }

    #[test]
    fn printer_uuid_is_stable() {
        let a = printer_uuid(SYSTEM, 8631, "Label Printer");
        let b = printer_uuid(SYSTEM, 8631, "Label Printer");
        assert_eq!(a, b);
    }

    #[test]
    fn printer_uuid_depends_on_every_key_part() {
        let base = printer_uuid(SYSTEM, 8631, "Label Printer");
        assert_ne!(base, printer_uuid(SYSTEM, 8632, "Label Printer"));
        assert_ne!(base, printer_uuid(SYSTEM, 8631, "Office"));
        assert_ne!(
            base,
            printer_uuid("urn:uuid:00000000-0000-3000-8000-000000000000", 8631, "Label Printer")
        );
    }

    #[test]
    fn job_uuids_do_not_collide() {
        let a = job_uuid(SYSTEM, 8631, "Label Printer", 1);
        let b = job_uuid(SYSTEM, 8631, "Label Printer", 2);
        assert_ne!(a, b);

        // Same job id twice still differs because of the salt.
        let c = job_uuid(SYSTEM, 8631, "Label Printer", 1);
        let d = job_uuid(SYSTEM, 8631, "Label Printer", 1);
        assert_ne!(c, d);
    }

    #[test]
    fn every_identity_has_version_3_and_rfc_variant() {
        let samples = [
            system_uuid(),
            system_uuid(),
            printer_uuid(SYSTEM, 631, "A"),
            job_uuid(SYSTEM, 631, "A", 7),
        ];
        for urn in &samples {
            assert!(urn.starts_with("urn:uuid:"), "{urn}");
            let (version, variant) = nibbles(urn);
            assert_eq!(version, '3', "{urn}");
            assert!(matches!(variant, '8' | '9' | 'a' | 'b'), "{urn}");
        }
    }

    #[test]
    fn make_uuid_reports_md5_version() {
        let uuid = make_uuid(IdentityKey::Printer {
            system_uuid: SYSTEM,
            port: 1,
            printer_name: "p",
        });
        assert_eq!(uuid.get_version_num(), 3);
        assert_eq!(uuid.get_variant(), uuid::Variant::RFC4122);
    }

    #[test]
    fn system_uuids_are_random() {
        assert_ne!(system_uuid(), system_uuid());
    }
}
