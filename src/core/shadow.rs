//! Local credential store access.
//!
//! Two ways to find a stored hash: the libc shadow database (`getspnam`), which honours
//! nsswitch, and a raw scan of the shadow file for platforms without it. The choice is
//! made once at startup by [`select_lookup`].

use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};

use super::auth::AuthError;

// ── Lookup capability ─────────────────────────────────────────────────────────

pub trait CredentialLookup {
    /// Stored hash field for `username`, exactly as the store holds it.
    fn password_hash(&self, username: &str) -> Result<String, AuthError>;

    fn name(&self) -> &'static str;
}

/// `true` for hash fields that mean "no password login": empty, `*`, `!`, `!!`
/// and locked hashes carrying a `!` prefix.
pub fn is_sentinel_hash(hash: &str) -> bool {
    hash.is_empty() || hash == "*" || hash.starts_with('!')
}

/// Raw scan of a shadow-format file (`name:hash:...`).
#[derive(Debug, Clone)]
pub struct ShadowFileLookup {
    path: PathBuf,
}

impl ShadowFileLookup {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialLookup for ShadowFileLookup {
    fn password_hash(&self, username: &str) -> Result<String, AuthError> {
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| AuthError::LookupFailure(format!("{}: {e}", self.path.display())))?;
        find_shadow_hash(&raw, username)
            .map(str::to_string)
            .ok_or_else(|| AuthError::LookupFailure(format!("no shadow entry for '{username}'")))
    }

    fn name(&self) -> &'static str {
        "shadow-file"
    }
}

fn find_shadow_hash<'a>(contents: &'a str, username: &str) -> Option<&'a str> {
    contents.lines().find_map(|line| {
        let mut fields = line.trim().split(':');
        let name = fields.next()?;
        if name.is_empty() || name != username {
            return None;
        }
        Some(fields.next().unwrap_or(""))
    })
}

/// Shadow database lookup through `getspnam(3)`.
#[cfg(all(target_os = "linux", target_env = "gnu"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredShadowLookup;

#[cfg(all(target_os = "linux", target_env = "gnu"))]
impl CredentialLookup for StructuredShadowLookup {
    fn password_hash(&self, username: &str) -> Result<String, AuthError> {
        let name = CString::new(username)
            .map_err(|_| AuthError::LookupFailure("username contains NUL".into()))?;
        // SAFETY: getspnam returns a pointer into static storage that stays valid until the
        // next shadow call; the hash is copied out before returning and the loop is
        // single-threaded.
        unsafe {
            let entry = libc::getspnam(name.as_ptr());
            if entry.is_null() || (*entry).sp_pwdp.is_null() {
                return Err(AuthError::LookupFailure(format!(
                    "no shadow entry for '{username}'"
                )));
            }
            Ok(CStr::from_ptr((*entry).sp_pwdp).to_string_lossy().into_owned())
        }
    }

    fn name(&self) -> &'static str {
        "getspnam"
    }
}

/// Picks the best lookup this platform offers.
pub fn select_lookup(shadow_path: &Path) -> Box<dyn CredentialLookup> {
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    {
        let _ = shadow_path;
        Box::new(StructuredShadowLookup)
    }
    #[cfg(not(all(target_os = "linux", target_env = "gnu")))]
    {
        Box::new(ShadowFileLookup::new(shadow_path))
    }
}

// ── Hash recomputation ────────────────────────────────────────────────────────

pub trait HashScheme {
    /// Hash `password` with the algorithm, cost and salt encoded in `setting`.
    fn hash(&self, password: &str, setting: &str) -> Result<String, AuthError>;
}

/// The system `crypt(3)` (libxcrypt on current Debian), so every scheme the host can
/// write (`$y$`, `$6$`, `$5$`, `$1$`, ...) can also be checked.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCrypt;

#[cfg(target_os = "linux")]
#[link(name = "crypt")]
extern "C" {
    fn crypt(key: *const libc::c_char, setting: *const libc::c_char) -> *mut libc::c_char;
}

#[cfg(target_os = "linux")]
impl HashScheme for SystemCrypt {
    fn hash(&self, password: &str, setting: &str) -> Result<String, AuthError> {
        let key = CString::new(password).map_err(|_| AuthError::Denied)?;
        let setting = CString::new(setting)
            .map_err(|_| AuthError::LookupFailure("stored hash contains NUL".into()))?;
        // SAFETY: both arguments are valid NUL-terminated strings; the returned buffer is
        // static and copied before the next call.
        let out = unsafe { crypt(key.as_ptr(), setting.as_ptr()) };
        if out.is_null() {
            return Err(AuthError::LookupFailure("crypt rejected the stored setting".into()));
        }
        let hashed = unsafe { CStr::from_ptr(out) }.to_string_lossy().into_owned();
        // libxcrypt signals failure with "*0" / "*1" instead of NULL.
        if hashed.starts_with('*') {
            return Err(AuthError::LookupFailure("unsupported hash scheme".into()));
        }
        Ok(hashed)
    }
}

#[cfg(not(target_os = "linux"))]
impl HashScheme for SystemCrypt {
    fn hash(&self, _password: &str, _setting: &str) -> Result<String, AuthError> {
        Err(AuthError::LookupFailure("crypt(3) unavailable on this platform".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const SHADOW: &str = "\
root:$6$abcdefgh$hashedvalue:19000:0:99999:7:::
daemon:*:19000:0:99999:7:::
backup:!:19000:0:99999:7:::
locked:!$6$abcdefgh$old:19000:0:99999:7:::
";

    fn shadow_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SHADOW.as_bytes()).unwrap();
        file
    }

    #[test]
    fn file_lookup_returns_second_field() {
        let file = shadow_file();
        let lookup = ShadowFileLookup::new(file.path());
        assert_eq!(lookup.password_hash("root").unwrap(), "$6$abcdefgh$hashedvalue");
        assert_eq!(lookup.password_hash("daemon").unwrap(), "*");
    }

    #[test]
    fn file_lookup_missing_user_is_lookup_failure() {
        let file = shadow_file();
        let lookup = ShadowFileLookup::new(file.path());
        assert!(matches!(
            lookup.password_hash("nobody"),
            Err(AuthError::LookupFailure(_))
        ));
    }

    #[test]
    fn file_lookup_does_not_match_prefixes() {
        let file = shadow_file();
        let lookup = ShadowFileLookup::new(file.path());
        assert!(lookup.password_hash("roo").is_err());
        assert!(lookup.password_hash("").is_err());
    }

    #[test]
    fn unreadable_store_is_lookup_failure() {
        let lookup = ShadowFileLookup::new("/nonexistent/shadow");
        assert!(matches!(
            lookup.password_hash("root"),
            Err(AuthError::LookupFailure(_))
        ));
    }

    #[test]
    fn sentinel_hashes() {
        for hash in ["", "*", "!", "!!", "!$6$abc$def"] {
            assert!(is_sentinel_hash(hash), "{hash:?} should be a sentinel");
        }
        assert!(!is_sentinel_hash("$6$abcdefgh$hashedvalue"));
        assert!(!is_sentinel_hash("$y$j9T$salt$hash"));
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn crypt_recomputes_from_its_own_output() {
        let stored = SystemCrypt.hash("correct horse", "$6$saltsalt$").unwrap();
        assert!(stored.starts_with("$6$saltsalt$"));
        assert_eq!(SystemCrypt.hash("correct horse", &stored).unwrap(), stored);
        assert_ne!(SystemCrypt.hash("wrong horse", &stored).unwrap(), stored);
    }
}
