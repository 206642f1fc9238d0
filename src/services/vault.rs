//! Password vault: encrypted credentials with an access log

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, NaiveDate, Utc};
use rand::{seq::SliceRandom, Rng};
use sha2::{Digest, Sha256};
use tracing::info;
use validator::Validate;

use crate::{
    config::VaultConfig,
    error::{AppError, AppResult},
    models::{
        enums::AccessAction,
        vault::{
            CreateSystem, CreateSystemAccount, PasswordAccessLog, RevealedPassword, System,
            SystemAccountView, UpdatePassword,
        },
    },
    repository::Repository,
};

const NONCE_LEN: usize = 12;

const LOWER: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const DIGITS: &[u8] = b"23456789";
const SYMBOLS: &[u8] = b"!@#$%^&*-_=+?";

/// AES-256-GCM cipher keyed by the SHA-256 of the vault secret
#[derive(Clone)]
pub struct VaultCipher {
    cipher: Aes256Gcm,
}

impl VaultCipher {
    pub fn new(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(digest.as_slice());
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Encrypt to base64(nonce || ciphertext)
    pub fn encrypt(&self, plaintext: &str) -> AppResult<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| AppError::Internal("Password encryption failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> AppResult<String> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|_| AppError::Internal("Stored password is not valid base64".to_string()))?;
        if bytes.len() <= NONCE_LEN {
            return Err(AppError::Internal("Stored password is truncated".to_string()));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AppError::Internal("Password decryption failed".to_string()))?;
        String::from_utf8(plaintext)
            .map_err(|_| AppError::Internal("Decrypted password is not UTF-8".to_string()))
    }
}

/// Random password with at least one character of each class
pub fn generate_password(length: usize) -> String {
    let classes = [LOWER, UPPER, DIGITS, SYMBOLS];
    let length = length.max(classes.len());
    let mut rng = rand::thread_rng();

    let mut chars: Vec<u8> = classes
        .iter()
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();
    let all: Vec<u8> = classes.concat();
    while chars.len() < length {
        chars.push(all[rng.gen_range(0..all.len())]);
    }
    chars.shuffle(&mut rng);
    chars.into_iter().map(char::from).collect()
}

#[derive(Clone)]
pub struct VaultService {
    repository: Repository,
    cipher: VaultCipher,
    config: VaultConfig,
}

impl VaultService {
    pub fn new(repository: Repository, config: VaultConfig) -> Self {
        Self {
            repository,
            cipher: VaultCipher::new(&config.key),
            config,
        }
    }

    fn default_expiry(&self) -> NaiveDate {
        Utc::now().date_naive() + Duration::days(self.config.password_expiry_days)
    }

    pub async fn list_systems(&self) -> AppResult<Vec<System>> {
        self.repository.vault_list_systems().await
    }

    pub async fn create_system(&self, data: &CreateSystem) -> AppResult<System> {
        data.validate()?;
        self.repository.vault_create_system(data).await
    }

    pub async fn list_accounts(&self, system_id: i32) -> AppResult<Vec<SystemAccountView>> {
        self.repository.vault_get_system(system_id).await?;
        let today = Utc::now().date_naive();
        let accounts = self.repository.vault_list_accounts(system_id).await?;
        Ok(accounts.into_iter().map(|a| a.into_view(today)).collect())
    }

    pub async fn create_account(
        &self,
        system_id: i32,
        data: &CreateSystemAccount,
        user_id: i32,
        ip_address: Option<&str>,
    ) -> AppResult<SystemAccountView> {
        data.validate()?;
        self.repository.vault_get_system(system_id).await?;

        let ciphertext = self.cipher.encrypt(&data.password)?;
        let expires_at = data.expires_at.unwrap_or_else(|| self.default_expiry());
        let account = self
            .repository
            .vault_create_account(
                system_id,
                &data.username,
                &ciphertext,
                expires_at,
                data.notes.as_deref(),
                user_id,
                ip_address,
            )
            .await?;

        info!(account_id = account.id, system_id, user_id, "Vault account created");
        Ok(account.into_view(Utc::now().date_naive()))
    }

    /// Decrypt a stored password and log the view
    pub async fn reveal_password(
        &self,
        account_id: i32,
        user_id: i32,
        ip_address: Option<&str>,
    ) -> AppResult<RevealedPassword> {
        let account = self.repository.vault_get_account(account_id).await?;
        let password = self.cipher.decrypt(&account.password_ciphertext)?;
        self.repository
            .vault_log_access(account_id, user_id, AccessAction::View, ip_address)
            .await?;

        info!(account_id, user_id, "Vault password viewed");
        Ok(RevealedPassword {
            account_id,
            is_expired: account.is_expired(Utc::now().date_naive()),
            username: account.username,
            password,
            expires_at: account.expires_at,
        })
    }

    pub async fn update_password(
        &self,
        account_id: i32,
        data: &UpdatePassword,
        user_id: i32,
        ip_address: Option<&str>,
    ) -> AppResult<SystemAccountView> {
        data.validate()?;
        let ciphertext = self.cipher.encrypt(&data.password)?;
        let expires_at = data.expires_at.unwrap_or_else(|| self.default_expiry());
        let account = self
            .repository
            .vault_set_password(account_id, &ciphertext, expires_at, AccessAction::Edit, user_id, ip_address)
            .await?;

        info!(account_id, user_id, "Vault password changed");
        Ok(account.into_view(Utc::now().date_naive()))
    }

    /// Replace the password with a generated one and return it
    pub async fn generate_password(
        &self,
        account_id: i32,
        user_id: i32,
        ip_address: Option<&str>,
    ) -> AppResult<RevealedPassword> {
        let password = generate_password(self.config.generated_password_length);
        let ciphertext = self.cipher.encrypt(&password)?;
        let account = self
            .repository
            .vault_set_password(
                account_id,
                &ciphertext,
                self.default_expiry(),
                AccessAction::Generate,
                user_id,
                ip_address,
            )
            .await?;

        info!(account_id, user_id, "Vault password generated");
        Ok(RevealedPassword {
            account_id,
            is_expired: account.is_expired(Utc::now().date_naive()),
            username: account.username,
            password,
            expires_at: account.expires_at,
        })
    }

    pub async fn access_logs(&self, account_id: i32) -> AppResult<Vec<PasswordAccessLog>> {
        self.repository.vault_get_account(account_id).await?;
        self.repository.vault_access_logs(account_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = VaultCipher::new("vault-secret");
        let stored = cipher.encrypt("hunter2").unwrap();
        assert!(!stored.contains("hunter2"));
        assert_eq!(cipher.decrypt(&stored).unwrap(), "hunter2");
    }

    #[test]
    fn test_nonce_makes_ciphertexts_differ() {
        let cipher = VaultCipher::new("vault-secret");
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn test_wrong_key_or_tampering_fails() {
        let stored = VaultCipher::new("a").encrypt("secret").unwrap();
        assert!(VaultCipher::new("b").decrypt(&stored).is_err());

        let mut bytes = STANDARD.decode(&stored).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert!(VaultCipher::new("a").decrypt(&STANDARD.encode(bytes)).is_err());
        assert!(VaultCipher::new("a").decrypt("AAAA").is_err());
    }

    #[test]
    fn test_generated_password_covers_every_class() {
        for length in [1, 4, 20, 64] {
            let password = generate_password(length);
            assert_eq!(password.len(), length.max(4));
            let bytes = password.as_bytes();
            for class in [LOWER, UPPER, DIGITS, SYMBOLS] {
                assert!(bytes.iter().any(|b| class.contains(b)), "{}", password);
            }
        }
    }
}
