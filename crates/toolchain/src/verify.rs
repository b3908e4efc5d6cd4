//! Release artifact verification.
//!
//! Which proof is acceptable is a fixed property of the tool, not of the
//! call site:
//!
//! - mise releases carry a detached OpenPGP signature; verifying it against
//!   the embedded keyring is mandatory and has no fallback.
//! - chezmoi releases carry a checksum file and usually a sigstore bundle
//!   over it; the bundle (checked against the transparency log and a pinned
//!   certificate identity) is preferred, plain checksum verification is the
//!   fallback.
//!
//! A [`VerificationOutcome`] never records success without a real method:
//! the `None` method exists only on failure paths.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use pgp::composed::{Deserializable, SignedPublicKey, StandaloneSignature};
use sha2::{Digest, Sha256};
use tracing::debug;

use dotkit_core::InstallRoot;

use crate::error::{Error, Result};
use crate::tool::{Tool, VerifyPolicy};

/// The verification method applied to an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyMethod {
    /// Nothing was checked. Only ever paired with failure.
    None,
    /// Detached OpenPGP signature against the embedded keyring.
    Signature,
    /// Sigstore bundle over the checksum file, then the checksum itself.
    BundleSignature,
    /// Plain checksum comparison; integrity only.
    Checksum,
}

impl std::fmt::Display for VerifyMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Signature => write!(f, "signature"),
            Self::BundleSignature => write!(f, "bundle-signature"),
            Self::Checksum => write!(f, "checksum"),
        }
    }
}

/// The record of a successful verification.
///
/// Failure outcomes travel as [`Error::VerificationFailed`], which carries
/// the attempted method, so callers can treat "error" and "verification
/// failed" interchangeably.
#[derive(Debug, Clone, Copy)]
pub struct VerificationOutcome {
    method: VerifyMethod,
}

impl VerificationOutcome {
    /// Record a passed verification. `method` must name a real check.
    fn passed(method: VerifyMethod) -> Self {
        assert_ne!(
            method,
            VerifyMethod::None,
            "a verification outcome cannot succeed without a method"
        );
        Self { method }
    }

    /// The method that was applied.
    #[must_use]
    pub fn method(self) -> VerifyMethod {
        self.method
    }
}

/// The artifacts available for one verification attempt.
#[derive(Debug, Clone, Copy)]
pub struct Artifacts<'a> {
    /// The downloaded release archive.
    pub archive: &'a Path,
    /// Detached signature over the archive, when downloaded.
    pub signature: Option<&'a Path>,
    /// Checksum file, when downloaded.
    pub checksums: Option<&'a Path>,
    /// Sigstore bundle over the checksum file, when downloaded.
    pub bundle: Option<&'a Path>,
}

/// Routes artifacts through the verification policy of each tool.
pub struct Verifier {
    keyrings_dir: PathBuf,
}

impl Verifier {
    /// Create a verifier reading keyrings from `root`.
    #[must_use]
    pub fn new(root: &InstallRoot) -> Self {
        Self {
            keyrings_dir: root.keyrings_dir(),
        }
    }

    /// Verify a downloaded release per the tool's policy.
    ///
    /// `bypass_signature` is a test-only escape hatch: for a tool whose
    /// policy requires a signature it does not skip verification, it fails
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VerificationFailed`] (or a more specific checksum /
    /// missing-signature error) whenever the artifact could not be proven
    /// authentic; never "succeeds" silently.
    pub async fn verify_artifact(
        &self,
        tool: Tool,
        artifacts: &Artifacts<'_>,
        bypass_signature: bool,
    ) -> Result<VerificationOutcome> {
        match tool.verify_policy() {
            VerifyPolicy::RequireSignature => {
                if bypass_signature {
                    return Err(Error::verification_failed(
                        tool.binary_name(),
                        VerifyMethod::None,
                        "signature bypass requested; refusing unverified install",
                    ));
                }
                let Some(signature) = artifacts.signature else {
                    return Err(Error::SignatureMissing {
                        tool: tool.to_string(),
                    });
                };
                self.verify_signature(tool, artifacts.archive, signature)?;
                Ok(VerificationOutcome::passed(VerifyMethod::Signature))
            }
            VerifyPolicy::PreferBundle => {
                let Some(checksums) = artifacts.checksums else {
                    return Err(Error::verification_failed(
                        tool.binary_name(),
                        VerifyMethod::Checksum,
                        "no checksum file available",
                    ));
                };
                if let Some(bundle) = artifacts.bundle {
                    self.verify_bundle(tool, bundle, checksums).await?;
                    verify_sha256(artifacts.archive, checksums)?;
                    Ok(VerificationOutcome::passed(VerifyMethod::BundleSignature))
                } else {
                    verify_sha256(artifacts.archive, checksums)?;
                    Ok(VerificationOutcome::passed(VerifyMethod::Checksum))
                }
            }
        }
    }

    /// Check a detached OpenPGP signature against the tool's keyring.
    fn verify_signature(&self, tool: Tool, archive: &Path, signature: &Path) -> Result<()> {
        let keyring_path = self.keyrings_dir.join(tool.keyring_file());
        let keyring = fs::read(&keyring_path).map_err(|err| {
            Error::Keyring(format!(
                "cannot read keyring {}: {err}",
                keyring_path.display()
            ))
        })?;
        let content = fs::read(archive)?;
        let sig_bytes = fs::read(signature)?;

        verify_detached_signature(&keyring, &sig_bytes, &content).map_err(|err| {
            debug!(tool = %tool, %err, "Signature verification failed");
            Error::verification_failed(
                tool.binary_name(),
                VerifyMethod::Signature,
                "signature verification failed",
            )
        })
    }

    /// Verify a sigstore bundle over the checksum file.
    ///
    /// The bundle must reference at least one transparency-log entry, parse
    /// as a bundle, and verify against the sigstore trust root under the
    /// tool's pinned certificate identity. A bundle that verifies
    /// cryptographically but carries no log entry is rejected.
    async fn verify_bundle(&self, tool: Tool, bundle_path: &Path, checksums: &Path) -> Result<()> {
        let failed = |detail: &str| {
            Error::verification_failed(tool.binary_name(), VerifyMethod::BundleSignature, detail)
        };

        let bundle_bytes = fs::read(bundle_path)?;
        let raw: serde_json::Value = serde_json::from_slice(&bundle_bytes)?;
        let tlog_entries = raw
            .get("verificationMaterial")
            .and_then(|m| m.get("tlogEntries"))
            .and_then(serde_json::Value::as_array)
            .map_or(0, Vec::len);
        if tlog_entries == 0 {
            return Err(failed("bundle carries no transparency log entry"));
        }

        let (identity, issuer) = tool
            .bundle_identity()
            .ok_or_else(|| failed("no certificate identity pinned for this tool"))?;
        let bundle: sigstore::bundle::Bundle =
            serde_json::from_slice(&bundle_bytes).map_err(|err| {
                debug!(tool = %tool, %err, "Bundle did not parse");
                failed("bundle verification failed")
            })?;
        let checksum_bytes = fs::read(checksums)?;

        let verified = tokio::task::spawn_blocking(move || {
            let verifier = sigstore::bundle::verify::blocking::Verifier::production()
                .map_err(|err| err.to_string())?;
            let policy = sigstore::bundle::verify::policy::Identity::new(&identity, issuer);
            verifier
                .verify(Cursor::new(checksum_bytes), bundle, &policy, true)
                .map_err(|err| err.to_string())
        })
        .await
        .map_err(|err| failed(&format!("bundle verification task failed: {err}")))?;

        verified.map_err(|err| {
            debug!(tool = %tool, err, "Bundle verification failed");
            failed("bundle verification failed")
        })
    }
}

/// Verify a detached signature, trying the armored form first and the raw
/// binary form second, against the primary key and then its signing subkeys.
fn verify_detached_signature(
    keyring: &[u8],
    signature: &[u8],
    content: &[u8],
) -> std::result::Result<(), pgp::errors::Error> {
    let key = parse_public_key(keyring)?;
    let sig = parse_signature(signature)?;

    match sig.verify(&key, content) {
        Ok(()) => Ok(()),
        Err(primary_err) => {
            for subkey in &key.public_subkeys {
                if sig.verify(subkey, content).is_ok() {
                    return Ok(());
                }
            }
            Err(primary_err)
        }
    }
}

fn parse_public_key(bytes: &[u8]) -> std::result::Result<SignedPublicKey, pgp::errors::Error> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        if let Ok((key, _)) = SignedPublicKey::from_string(text) {
            return Ok(key);
        }
    }
    SignedPublicKey::from_bytes(Cursor::new(bytes))
}

fn parse_signature(bytes: &[u8]) -> std::result::Result<StandaloneSignature, pgp::errors::Error> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        if let Ok((sig, _)) = StandaloneSignature::from_string(text) {
            return Ok(sig);
        }
    }
    StandaloneSignature::from_bytes(Cursor::new(bytes))
}

/// Verify `artifact` against a checksum file.
///
/// The expected hash is looked up by the artifact's exact file name first,
/// then by base name (checksum files sometimes list paths); both the name
/// and the hex digest are compared case-insensitively.
pub fn verify_sha256(artifact: &Path, checksums: &Path) -> Result<()> {
    let file_name = artifact
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or_default();
    let expected = find_checksum(&fs::read_to_string(checksums)?, file_name)
        .ok_or_else(|| Error::ChecksumNotFound {
            file_name: file_name.to_string(),
        })?;

    let actual = sha256_hex(artifact)?;
    if actual.eq_ignore_ascii_case(&expected) {
        debug!(file = file_name, "Checksum verified");
        Ok(())
    } else {
        Err(Error::ChecksumMismatch {
            file_name: file_name.to_string(),
        })
    }
}

/// Look up the hash listed for `file_name`, exact name first, base name
/// second.
fn find_checksum(listing: &str, file_name: &str) -> Option<String> {
    let mut basename_match = None;
    for line in listing.lines() {
        let mut parts = line.split_whitespace();
        let (Some(hash), Some(listed)) = (parts.next(), parts.next()) else {
            continue;
        };
        // A leading '*' marks binary mode in sha256sum output.
        let listed = listed.trim_start_matches('*');
        if listed.eq_ignore_ascii_case(file_name) {
            return Some(hash.to_string());
        }
        let listed_base = Path::new(listed)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(listed);
        if basename_match.is_none() && listed_base.eq_ignore_ascii_case(file_name) {
            basename_match = Some(hash.to_string());
        }
    }
    basename_match
}

/// SHA-256 of a file, lowercase hex.
fn sha256_hex(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;
    use tempfile::TempDir;

    const SIGNED_DATA: &[u8] = include_bytes!("../tests/fixtures/signed-data.txt");
    const ARMORED_SIG: &[u8] = include_bytes!("../tests/fixtures/signed-data.txt.asc");
    const BINARY_SIG: &[u8] = include_bytes!("../tests/fixtures/signed-data.txt.sig");

    fn verifier_with_keyrings(temp: &TempDir) -> Verifier {
        let root = InstallRoot::new(temp.path());
        keys::ensure_keyrings(&root).unwrap();
        Verifier::new(&root)
    }

    #[test]
    fn test_armored_signature_verifies() {
        verify_detached_signature(keys::MISE_KEYRING, ARMORED_SIG, SIGNED_DATA).unwrap();
    }

    #[test]
    fn test_binary_signature_verifies() {
        verify_detached_signature(keys::MISE_KEYRING, BINARY_SIG, SIGNED_DATA).unwrap();
    }

    #[test]
    fn test_signature_rejects_modified_content() {
        let mut tampered = SIGNED_DATA.to_vec();
        tampered[0] ^= 0xff;
        assert!(verify_detached_signature(keys::MISE_KEYRING, ARMORED_SIG, &tampered).is_err());
    }

    #[test]
    fn test_signature_rejects_corrupted_signature() {
        let mut corrupted = BINARY_SIG.to_vec();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xff;
        assert!(
            verify_detached_signature(keys::MISE_KEYRING, &corrupted, SIGNED_DATA).is_err()
        );
    }

    #[test]
    fn test_verify_sha256_exact_and_basename_match() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("tool.tar.gz");
        fs::write(&artifact, b"artifact bytes").unwrap();
        let hash = sha256_hex(&artifact).unwrap();

        let exact = temp.path().join("exact.txt");
        fs::write(&exact, format!("{hash}  tool.tar.gz\n")).unwrap();
        verify_sha256(&artifact, &exact).unwrap();

        let pathy = temp.path().join("pathy.txt");
        fs::write(&pathy, format!("{hash}  dist/release/tool.tar.gz\n")).unwrap();
        verify_sha256(&artifact, &pathy).unwrap();
    }

    #[test]
    fn test_verify_sha256_is_case_insensitive_on_hex() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("tool.tar.gz");
        fs::write(&artifact, b"artifact bytes").unwrap();
        let hash = sha256_hex(&artifact).unwrap().to_uppercase();

        let checksums = temp.path().join("checksums.txt");
        fs::write(&checksums, format!("{hash} *tool.tar.gz\n")).unwrap();
        verify_sha256(&artifact, &checksums).unwrap();
    }

    #[test]
    fn test_verify_sha256_missing_entry() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("tool.tar.gz");
        fs::write(&artifact, b"artifact bytes").unwrap();

        let checksums = temp.path().join("checksums.txt");
        fs::write(&checksums, "0123abcd  some-other-file.tar.gz\n").unwrap();

        let err = verify_sha256(&artifact, &checksums).unwrap_err();
        assert!(matches!(err, Error::ChecksumNotFound { .. }));
    }

    #[test]
    fn test_verify_sha256_mismatch() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("tool.tar.gz");
        fs::write(&artifact, b"artifact bytes").unwrap();

        let checksums = temp.path().join("checksums.txt");
        fs::write(
            &checksums,
            format!("{}  tool.tar.gz\n", "0".repeat(64)),
        )
        .unwrap();

        let err = verify_sha256(&artifact, &checksums).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
    }

    #[tokio::test]
    async fn test_mise_requires_signature() {
        let temp = TempDir::new().unwrap();
        let verifier = verifier_with_keyrings(&temp);
        let archive = temp.path().join("mise.tar.gz");
        fs::write(&archive, b"bytes").unwrap();

        let artifacts = Artifacts {
            archive: &archive,
            signature: None,
            checksums: None,
            bundle: None,
        };
        let err = verifier
            .verify_artifact(Tool::Mise, &artifacts, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SignatureMissing { .. }));
    }

    #[tokio::test]
    async fn test_mise_bypass_flag_fails_outright() {
        let temp = TempDir::new().unwrap();
        let verifier = verifier_with_keyrings(&temp);
        let archive = temp.path().join("mise.tar.gz");
        fs::write(&archive, b"bytes").unwrap();
        let signature = temp.path().join("mise.tar.gz.sig");
        fs::write(&signature, BINARY_SIG).unwrap();

        let artifacts = Artifacts {
            archive: &archive,
            signature: Some(&signature),
            checksums: None,
            bundle: None,
        };
        let err = verifier
            .verify_artifact(Tool::Mise, &artifacts, true)
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::VerificationFailed { method: VerifyMethod::None, .. })
        );
    }

    #[tokio::test]
    async fn test_mise_signature_path_end_to_end() {
        let temp = TempDir::new().unwrap();
        let verifier = verifier_with_keyrings(&temp);
        let archive = temp.path().join("mise.tar.gz");
        fs::write(&archive, SIGNED_DATA).unwrap();
        let signature = temp.path().join("mise.tar.gz.sig");
        fs::write(&signature, ARMORED_SIG).unwrap();

        let artifacts = Artifacts {
            archive: &archive,
            signature: Some(&signature),
            checksums: None,
            bundle: None,
        };
        let outcome = verifier
            .verify_artifact(Tool::Mise, &artifacts, false)
            .await
            .unwrap();
        assert_eq!(outcome.method(), VerifyMethod::Signature);
    }

    #[tokio::test]
    async fn test_chezmoi_falls_back_to_checksum_without_bundle() {
        let temp = TempDir::new().unwrap();
        let verifier = verifier_with_keyrings(&temp);
        let archive = temp.path().join("chezmoi.tar.gz");
        fs::write(&archive, b"release bytes").unwrap();
        let hash = sha256_hex(&archive).unwrap();
        let checksums = temp.path().join("checksums.txt");
        fs::write(&checksums, format!("{hash}  chezmoi.tar.gz\n")).unwrap();

        let artifacts = Artifacts {
            archive: &archive,
            signature: None,
            checksums: Some(&checksums),
            bundle: None,
        };
        let outcome = verifier
            .verify_artifact(Tool::Chezmoi, &artifacts, false)
            .await
            .unwrap();
        assert_eq!(outcome.method(), VerifyMethod::Checksum);
    }

    #[tokio::test]
    async fn test_chezmoi_requires_checksum_file() {
        let temp = TempDir::new().unwrap();
        let verifier = verifier_with_keyrings(&temp);
        let archive = temp.path().join("chezmoi.tar.gz");
        fs::write(&archive, b"release bytes").unwrap();

        let artifacts = Artifacts {
            archive: &archive,
            signature: None,
            checksums: None,
            bundle: None,
        };
        let err = verifier
            .verify_artifact(Tool::Chezmoi, &artifacts, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::VerificationFailed { method: VerifyMethod::Checksum, .. }
        ));
    }

    #[tokio::test]
    async fn test_bundle_without_tlog_entries_is_rejected_before_any_network() {
        let temp = TempDir::new().unwrap();
        let verifier = verifier_with_keyrings(&temp);
        let archive = temp.path().join("chezmoi.tar.gz");
        fs::write(&archive, b"release bytes").unwrap();
        let hash = sha256_hex(&archive).unwrap();
        let checksums = temp.path().join("checksums.txt");
        fs::write(&checksums, format!("{hash}  chezmoi.tar.gz\n")).unwrap();
        let bundle = temp.path().join("checksums.txt.sigstore.json");
        fs::write(
            &bundle,
            r#"{"mediaType":"application/vnd.dev.sigstore.bundle.v0.3+json","verificationMaterial":{"tlogEntries":[]}}"#,
        )
        .unwrap();

        let artifacts = Artifacts {
            archive: &archive,
            signature: None,
            checksums: Some(&checksums),
            bundle: Some(&bundle),
        };
        let err = verifier
            .verify_artifact(Tool::Chezmoi, &artifacts, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::VerificationFailed { method: VerifyMethod::BundleSignature, .. }
        ));
        assert!(err.to_string().contains("transparency log"));
    }

    #[test]
    #[should_panic(expected = "cannot succeed without a method")]
    fn test_outcome_cannot_pass_without_method() {
        let _ = VerificationOutcome::passed(VerifyMethod::None);
    }
}
