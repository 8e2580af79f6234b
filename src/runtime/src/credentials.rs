//! Registry credentials.
//!
//! Credentials are kept per registry host. The file backed store reads them
//! from `~/.hoist/credentials.json` unless configured otherwise.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use hoist_core::error::{HoistError, Result};
use hoist_core::options::UserPasswordAuth;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// How to authenticate against a registry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum AuthMethod {
    /// Username and password
    Basic { username: String, password: String },
    /// Private key file, optionally protected by a password
    KeyFile {
        private_key_file: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    /// Keys served by the local ssh agent
    SshAgent,
    /// Token obtained from AWS ECR
    AwsEcr {
        region: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role_arn: Option<String>,
    },
}

impl AuthMethod {
    /// Basic auth shorthand
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        AuthMethod::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Method name as used in error messages and credential files
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::Basic { .. } => "basic",
            AuthMethod::KeyFile { .. } => "keyfile",
            AuthMethod::SshAgent => "sshagent",
            AuthMethod::AwsEcr { .. } => "aws-ecr",
        }
    }

    /// Username/password credentials, for basic auth only
    pub fn as_user_password(&self) -> Option<UserPasswordAuth> {
        match self {
            AuthMethod::Basic { username, password } => {
                Some(UserPasswordAuth::new(username.clone(), password.clone()))
            }
            _ => None,
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            AuthMethod::KeyFile {
                private_key_file, ..
            } => f
                .debug_struct("KeyFile")
                .field("private_key_file", private_key_file)
                .finish_non_exhaustive(),
            AuthMethod::SshAgent => write!(f, "SshAgent"),
            AuthMethod::AwsEcr { region, role_arn } => f
                .debug_struct("AwsEcr")
                .field("region", region)
                .field("role_arn", role_arn)
                .finish(),
        }
    }
}

/// Resolves the credentials of a registry host
pub trait CredentialsStore: Send + Sync {
    fn get(&self, registry: &str) -> Result<Option<AuthMethod>>;
}

/// Persistent credential file format.
#[derive(Debug, Default, Deserialize)]
struct CredentialFile {
    registries: HashMap<String, AuthMethod>,
}

/// Credentials kept in a JSON file.
pub struct FileCredentialsStore {
    path: PathBuf,
}

impl FileCredentialsStore {
    /// Create a credential store at the default path (`~/.hoist/credentials.json`).
    pub fn default_path() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            HoistError::Other("Cannot determine home directory for credential store".to_string())
        })?;
        Ok(Self {
            path: home.join(".hoist").join("credentials.json"),
        })
    }

    /// Create a credential store at a custom path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the credential file from disk. Returns empty if not found.
    fn load(&self) -> Result<CredentialFile> {
        if !self.path.exists() {
            return Ok(CredentialFile::default());
        }
        let data = std::fs::read_to_string(&self.path).map_err(|e| {
            HoistError::Other(format!(
                "Failed to read credential store {}: {}",
                self.path.display(),
                e
            ))
        })?;
        let file: CredentialFile = serde_json::from_str(&data).map_err(|e| {
            HoistError::Serialization(format!(
                "Failed to parse credential store {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(CredentialFile {
            registries: file
                .registries
                .into_iter()
                .map(|(registry, method)| (normalize_registry(&registry), method))
                .collect(),
        })
    }
}

impl CredentialsStore for FileCredentialsStore {
    fn get(&self, registry: &str) -> Result<Option<AuthMethod>> {
        let file = self.load()?;
        Ok(file.registries.get(&normalize_registry(registry)).cloned())
    }
}

/// Credentials kept in memory
#[derive(Default)]
pub struct MemoryCredentialsStore {
    registries: RwLock<HashMap<String, AuthMethod>>,
}

impl MemoryCredentialsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store credentials for a registry. Overwrites existing entry.
    pub fn store(&self, registry: &str, method: AuthMethod) {
        self.registries
            .write()
            .insert(normalize_registry(registry), method);
    }
}

impl CredentialsStore for MemoryCredentialsStore {
    fn get(&self, registry: &str) -> Result<Option<AuthMethod>> {
        Ok(self
            .registries
            .read()
            .get(&normalize_registry(registry))
            .cloned())
    }
}

/// Normalize registry names (e.g., "docker.io" and "index.docker.io" → "index.docker.io").
pub fn normalize_registry(registry: &str) -> String {
    let r = registry.trim().to_lowercase();
    if r == "docker.io" || r == "registry-1.docker.io" {
        "index.docker.io".to_string()
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_store(dir: &TempDir, content: &str) -> FileCredentialsStore {
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, content).unwrap();
        FileCredentialsStore::new(path)
    }

    #[test]
    fn test_get_basic() {
        let dir = TempDir::new().unwrap();
        let store = write_store(
            &dir,
            r#"{"registries":{"ghcr.io":{"method":"basic","username":"user1","password":"pass1"}}}"#,
        );

        let creds = store.get("ghcr.io").unwrap();
        assert_eq!(creds, Some(AuthMethod::basic("user1", "pass1")));
    }

    #[test]
    fn test_get_nonexistent() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialsStore::new(dir.path().join("credentials.json"));

        assert_eq!(store.get("ghcr.io").unwrap(), None);
    }

    #[test]
    fn test_docker_io_normalization() {
        let dir = TempDir::new().unwrap();
        let store = write_store(
            &dir,
            r#"{"registries":{"docker.io":{"method":"ssh-agent"}}}"#,
        );

        // All Docker Hub aliases should resolve to the same entry
        assert!(store.get("index.docker.io").unwrap().is_some());
        assert!(store.get("registry-1.docker.io").unwrap().is_some());
    }

    #[test]
    fn test_file_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(
            &path,
            r#"{"registries":{"registry.example.com":{"method":"key-file","private_key_file":"/keys/id"}}}"#,
        )
        .unwrap();

        let store = FileCredentialsStore::new(path);
        let method = store.get("registry.example.com").unwrap().unwrap();
        assert_eq!(method.name(), "keyfile");
        assert!(method.as_user_password().is_none());
    }

    #[test]
    fn test_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileCredentialsStore::new(path);
        assert!(matches!(
            store.get("ghcr.io"),
            Err(HoistError::Serialization(_))
        ));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCredentialsStore::new();
        store.store("Registry.Example.com", AuthMethod::basic("u", "p"));
        let method = store.get("registry.example.com").unwrap().unwrap();
        assert_eq!(method.as_user_password(), Some(UserPasswordAuth::new("u", "p")));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let debug = format!("{:?}", AuthMethod::basic("user", "hunter2"));
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }
}
