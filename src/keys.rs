use core::fmt;

use rand_core::{OsRng, RngCore};
use zeroize::Zeroizing;

use crate::{
    errors::TicketError,
    types::{SecurityProfile, MAX_SALT_LEN, MIN_SALT_LEN, RECOMMENDED_SALT_LEN},
};

/// Cipher key and salt for one issuance generation.
///
/// A key without a salt can open tickets and check their structure but can
/// neither issue nor authenticate them. Both buffers are wiped on drop.
pub struct KeyMaterial {
    profile: SecurityProfile,
    cipher_key: Zeroizing<Vec<u8>>,
    salt: Option<Zeroizing<Vec<u8>>>,
    generation: u32,
}

/// Fill a fresh buffer from the operating system's entropy source.
///
/// # Errors
///
/// `Entropy` when the source fails.
pub fn random_bytes(len: usize) -> Result<Zeroizing<Vec<u8>>, TicketError> {
    let mut buf = Zeroizing::new(vec![0u8; len]);
    OsRng
        .try_fill_bytes(buf.as_mut_slice())
        .map_err(|e| TicketError::Entropy(e.to_string()))?;
    Ok(buf)
}

fn check_salt(salt: &[u8]) -> Result<(), TicketError> {
    if !(MIN_SALT_LEN..=MAX_SALT_LEN).contains(&salt.len()) {
        return Err(TicketError::InvalidSaltLength {
            min: MIN_SALT_LEN,
            max: MAX_SALT_LEN,
            got: salt.len(),
        });
    }
    if salt.len() < RECOMMENDED_SALT_LEN {
        tracing::warn!(
            salt_len = salt.len(),
            recommended = RECOMMENDED_SALT_LEN,
            "salt is shorter than recommended"
        );
    }
    Ok(())
}

fn check_key(profile: SecurityProfile, key: &[u8]) -> Result<(), TicketError> {
    if key.len() != profile.key_len() {
        return Err(TicketError::InvalidKeyLength {
            expected: profile.key_len(),
            got: key.len(),
        });
    }
    Ok(())
}

impl KeyMaterial {
    /// Validate supplied material, generating whatever is missing.
    ///
    /// # Errors
    ///
    /// `InvalidKeyLength`, `InvalidSaltLength` or `Entropy`.
    pub fn initialize(
        profile: SecurityProfile,
        cipher_key: Option<Vec<u8>>,
        salt: Option<Vec<u8>>,
    ) -> Result<Self, TicketError> {
        let cipher_key = match cipher_key {
            Some(k) => {
                let k = Zeroizing::new(k);
                check_key(profile, &k)?;
                k
            }
            None => {
                tracing::info!(%profile, key_len = profile.key_len(), "generated a random cipher key");
                random_bytes(profile.key_len())?
            }
        };
        let salt = match salt {
            Some(s) => {
                let s = Zeroizing::new(s);
                check_salt(&s)?;
                s
            }
            None => {
                tracing::info!(salt_len = MAX_SALT_LEN, "generated a random salt");
                random_bytes(MAX_SALT_LEN)?
            }
        };
        Ok(Self { profile, cipher_key, salt: Some(salt), generation: 0 })
    }

    /// Fresh random key and salt.
    ///
    /// # Errors
    ///
    /// `Entropy` when the OS source fails.
    pub fn generate(profile: SecurityProfile) -> Result<Self, TicketError> {
        Self::initialize(profile, None, None)
    }

    /// Key without salt, for offline structural checks.
    ///
    /// # Errors
    ///
    /// `InvalidKeyLength`.
    pub fn verify_only(profile: SecurityProfile, cipher_key: Vec<u8>) -> Result<Self, TicketError> {
        let cipher_key = Zeroizing::new(cipher_key);
        check_key(profile, &cipher_key)?;
        Ok(Self { profile, cipher_key, salt: None, generation: 0 })
    }

    /// Next generation with a fresh key and salt.
    ///
    /// Tickets sealed under `self` will not open under the result.
    ///
    /// # Errors
    ///
    /// `MissingSalt` for verify-only material, `Entropy` on source failure.
    pub fn rotate(&self) -> Result<Self, TicketError> {
        if self.salt.is_none() {
            return Err(TicketError::MissingSalt);
        }
        let mut next = Self::generate(self.profile)?;
        next.generation = self.generation.wrapping_add(1);
        tracing::info!(generation = next.generation, "rotated ticket keys");
        Ok(next)
    }

    #[must_use]
    pub const fn profile(&self) -> SecurityProfile {
        self.profile
    }

    #[must_use]
    pub fn cipher_key(&self) -> &[u8] {
        &self.cipher_key
    }

    #[must_use]
    pub fn salt(&self) -> Option<&[u8]> {
        self.salt.as_ref().map(|s| s.as_slice())
    }

    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Whether tickets of `profile` can be opened with this key.
    #[must_use]
    pub fn supports(&self, profile: SecurityProfile) -> bool {
        self.cipher_key.len() == profile.key_len()
    }

    /// # Errors
    ///
    /// `ProfileKeyMismatch` when the key length does not fit `profile`.
    pub fn check_profile(&self, profile: SecurityProfile) -> Result<(), TicketError> {
        if self.supports(profile) {
            Ok(())
        } else {
            Err(TicketError::ProfileKeyMismatch {
                profile,
                expected: profile.key_len(),
                got: self.cipher_key.len(),
            })
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("profile", &self.profile)
            .field("cipher_key", &"<redacted>")
            .field("salt", &self.salt.as_ref().map(|_| "<redacted>"))
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn generated_material_has_profile_sizes() {
        for p in SecurityProfile::ALL {
            let k = KeyMaterial::generate(p).unwrap();
            assert_eq!(k.cipher_key().len(), p.key_len());
            assert_eq!(k.salt().map(<[u8]>::len), Some(MAX_SALT_LEN));
            assert_eq!(k.generation(), 0);
        }
    }

    #[test]
    fn supplied_key_must_match_profile() {
        let err = KeyMaterial::initialize(SecurityProfile::High, Some(vec![0; 16]), None).unwrap_err();
        assert!(matches!(err, TicketError::InvalidKeyLength { expected: 24, got: 16 }));
        assert!(err.is_config());
    }

    #[test]
    fn salt_bounds() {
        let p = SecurityProfile::Medium;
        for bad in [0usize, 23, 65] {
            assert!(matches!(
                KeyMaterial::initialize(p, None, Some(vec![1; bad])),
                Err(TicketError::InvalidSaltLength { got, .. }) if got == bad
            ));
        }
        for ok in [24usize, 32, 64] {
            assert!(KeyMaterial::initialize(p, None, Some(vec![1; ok])).is_ok());
        }
    }

    #[test]
    fn verify_only_has_no_salt() {
        let k = KeyMaterial::verify_only(SecurityProfile::Low, vec![3; 16]).unwrap();
        assert!(k.salt().is_none());
        assert!(k.supports(SecurityProfile::Medium));
        assert!(!k.supports(SecurityProfile::High));
        assert!(matches!(k.rotate(), Err(TicketError::MissingSalt)));
    }

    #[test]
    fn rotation_bumps_generation_and_changes_key() {
        let k = KeyMaterial::generate(SecurityProfile::QuantumResistant).unwrap();
        let r = k.rotate().unwrap();
        assert_eq!(r.generation(), 1);
        assert_ne!(r.cipher_key(), k.cipher_key());
        assert_ne!(r.salt(), k.salt());
    }

    #[test]
    fn debug_redacts_secrets() {
        let k = KeyMaterial::initialize(SecurityProfile::Low, Some(vec![0xee; 16]), None).unwrap();
        let dbg = format!("{k:?}");
        assert!(dbg.contains("<redacted>"));
        assert!(!dbg.contains("238"));
    }

    #[test]
    fn random_bytes_fill_fresh_buffers() {
        let a = random_bytes(32).unwrap();
        let b = random_bytes(32).unwrap();
        assert_eq!(a.len(), 32);
        assert_ne!(*a, *b);
    }

    #[test]
    fn profile_mismatch_is_reported() {
        let k = KeyMaterial::generate(SecurityProfile::Medium).unwrap();
        assert!(k.check_profile(SecurityProfile::Low).is_ok());
        assert!(matches!(
            k.check_profile(SecurityProfile::QuantumResistant),
            Err(TicketError::ProfileKeyMismatch { expected: 32, got: 16, .. })
        ));
    }
}
