use super::model::Account;

/// What the authentication layer needs from a user record.
pub trait UserIdentity {
    /// Canonical login name.
    fn identity(&self) -> &str;
    /// Encoded credential, compared by the credential layer only.
    fn credential_hash(&self) -> &str;
    fn roles(&self) -> Vec<String>;
    /// Drops any plaintext credential still held in memory.
    fn clear_transient_credentials(&mut self);
}

impl UserIdentity for Account {
    fn identity(&self) -> &str {
        self.username()
    }

    fn credential_hash(&self) -> &str {
        self.password_hash()
    }

    fn roles(&self) -> Vec<String> {
        Account::roles(self)
    }

    fn clear_transient_credentials(&mut self) {
        self.clear_plain_password();
    }
}
