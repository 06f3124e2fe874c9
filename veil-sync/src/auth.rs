//! Phone-code login.
//!
//! `auth.sendCode` is the request family the transport redirects with
//! `PHONE_MIGRATE`; the client moves its default DC on that redirect so the
//! later `auth.signIn` reaches the DC that issued the code.

use serde_json::json;
use veil_client::{InvocationError, RpcTransport};

use crate::errors::{LoginToken, SignInError};
use crate::overlay::Encryption;
use crate::raw::{RawAuthorization, RawSentCode};
use crate::{Session, Synchronizer};

impl<T: RpcTransport, E: Encryption> Synchronizer<T, E> {
    /// Ask the transport to send a login code to `phone`.
    pub async fn request_login_code(&self, phone: &str) -> Result<LoginToken, InvocationError> {
        let req = json!({
            "phone_number": phone,
            "settings":     { "_": "codeSettings" },
        });
        let sent: RawSentCode = self.client().invoke_as("auth.sendCode", &req).await?;
        tracing::info!("[veil-sync] Login code sent");
        Ok(LoginToken { phone: phone.to_string(), phone_code_hash: sent.phone_code_hash })
    }

    /// Complete login with the received `code` and start a session.
    pub async fn sign_in(&self, token: &LoginToken, code: &str) -> Result<Session, SignInError> {
        let req = json!({
            "phone_number":    token.phone,
            "phone_code_hash": token.phone_code_hash,
            "phone_code":      code,
        });
        let auth = match self.client().invoke_as::<RawAuthorization>("auth.signIn", &req).await {
            Ok(a) => a,
            Err(e) if e.is("PHONE_CODE_*")             => return Err(SignInError::InvalidCode),
            Err(e) if e.is("SESSION_PASSWORD_NEEDED")  => return Err(SignInError::PasswordRequired),
            Err(e)                                     => return Err(SignInError::Other(e)),
        };
        if let RawAuthorization::SignUpRequired = auth {
            return Err(SignInError::SignUpRequired);
        }

        // A stale session from a previous account must not survive the login.
        self.destroy().await;
        self.init().await.ok_or_else(|| {
            SignInError::Other(InvocationError::Deserialize("self-lookup failed after sign-in".into()))
        })
    }
}
