// src/auth.rs
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::AuthError;

/// Length of generated and derived user ids.
pub const USER_ID_LEN: usize = 28;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub anonymous: bool,
}

fn auth_io(source: std::io::Error, context: String) -> AuthError {
    AuthError::Io { source, context }
}

/// Resolves the user id the timesheets are stored under.
#[derive(Debug, Clone)]
pub struct AuthClient {
    initial_token: Option<String>,
    identity_file: PathBuf,
}

impl AuthClient {
    pub fn new(initial_token: Option<String>, identity_file: impl Into<PathBuf>) -> Self {
        Self {
            initial_token,
            identity_file: identity_file.into(),
        }
    }

    pub fn identity_file(&self) -> &Path {
        &self.identity_file
    }

    /// Signs in with the pre-issued token when one is configured, otherwise
    /// anonymously with an id kept in the identity file across restarts.
    pub async fn sign_in(&self) -> Result<Identity, AuthError> {
        match &self.initial_token {
            Some(token) => {
                let identity = Identity {
                    user_id: user_id_from_token(token)?,
                    anonymous: false,
                };
                info!("Signed in with custom token as {}", identity.user_id);
                Ok(identity)
            }
            None => self.sign_in_anonymously(),
        }
    }

    fn sign_in_anonymously(&self) -> Result<Identity, AuthError> {
        if let Some(identity) = self.load_identity()? {
            info!("Reusing anonymous identity {}", identity.user_id);
            return Ok(identity);
        }

        let identity = Identity {
            user_id: generate_user_id(),
            anonymous: true,
        };
        self.save_identity(&identity)?;
        info!(
            "Created anonymous identity {} in {:?}",
            identity.user_id, self.identity_file
        );
        Ok(identity)
    }

    fn load_identity(&self) -> Result<Option<Identity>, AuthError> {
        if !self.identity_file.exists() {
            return Ok(None);
        }
        let json_string = fs::read_to_string(&self.identity_file).map_err(|e| {
            auth_io(e, format!("Failed to read identity file: {:?}", self.identity_file))
        })?;
        let identity: Identity = serde_json::from_str(&json_string)?;
        if identity.user_id.trim().is_empty() {
            warn!("Identity file {:?} holds an empty user id", self.identity_file);
            return Ok(None);
        }
        Ok(Some(identity))
    }

    fn save_identity(&self, identity: &Identity) -> Result<(), AuthError> {
        if let Some(parent) = self.identity_file.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    auth_io(e, format!("Failed to create directory for identity file: {:?}", parent))
                })?;
            }
        }
        let json_string = serde_json::to_string_pretty(identity)?;
        fs::write(&self.identity_file, json_string.as_bytes()).map_err(|e| {
            auth_io(e, format!("Failed to write identity file: {:?}", self.identity_file))
        })
    }
}

pub fn user_id_from_token(token: &str) -> Result<String, AuthError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::EmptyToken);
    }
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hex::encode(hasher.finalize());
    Ok(digest[..USER_ID_LEN].to_string())
}

fn generate_user_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(USER_ID_LEN)
        .map(char::from)
        .collect()
}
