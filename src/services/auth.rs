use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        ChangePasswordRequest, Claims, EmailClaims, GoogleIdentity, PersonalInfo, SessionPayload,
        SigninRequest, SignupRequest, User,
    },
    services::{mailer::Mailer, Database},
    state::AppState,
    store::{Collection, Filter, Update},
    utils::{
        serde_helpers::{now, timestamp},
        slug::username_from_email,
        validation::{validate_email_format, validate_nim, validate_password},
    },
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    headers::{authorization::Bearer, Authorization},
    http::request::Parts,
    RequestPartsExt, TypedHeader,
};
use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

/// 已认证的请求方
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub admin: bool,
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<()> {
        if self.admin {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin access required"))
        }
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            admin: claims.admin,
        }
    }
}

/// 外部 Google 身份校验
#[async_trait]
pub trait GoogleVerifier: Send + Sync {
    async fn verify(&self, access_token: &str) -> Result<GoogleIdentity>;
}

/// 通过 Google token-info 接口校验
pub struct TokenInfoVerifier {
    http_client: Client,
    endpoint: String,
}

impl TokenInfoVerifier {
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http_client,
            endpoint: config.google_tokeninfo_url.clone(),
        })
    }
}

#[async_trait]
impl GoogleVerifier for TokenInfoVerifier {
    async fn verify(&self, access_token: &str) -> Result<GoogleIdentity> {
        let response = self
            .http_client
            .get(&self.endpoint)
            .query(&[("id_token", access_token)])
            .send()
            .await
            .map_err(|e| {
                warn!("Google token verification request failed: {}", e);
                AppError::ExternalService("Failed to reach Google".to_string())
            })?;

        if !response.status().is_success() {
            return Err(AppError::unauthorized(
                "Failed to authenticate, try another Google account",
            ));
        }

        response.json::<GoogleIdentity>().await.map_err(|e| {
            warn!("Unexpected Google token-info payload: {}", e);
            AppError::ExternalService("Unexpected response from Google".to_string())
        })
    }
}

#[derive(Clone)]
pub struct AuthService {
    db: Arc<Database>,
    config: Config,
    mailer: Arc<dyn Mailer>,
    google: Arc<dyn GoogleVerifier>,
}

impl AuthService {
    pub async fn new(db: Arc<Database>, config: &Config) -> Result<Self> {
        let mailer = crate::services::mailer::mailer_from_config(config)?;
        let google = Arc::new(TokenInfoVerifier::new(config)?);
        Ok(Self::with_collaborators(db, config, mailer, google))
    }

    pub fn with_collaborators(
        db: Arc<Database>,
        config: &Config,
        mailer: Arc<dyn Mailer>,
        google: Arc<dyn GoogleVerifier>,
    ) -> Self {
        Self {
            db,
            config: config.clone(),
            mailer,
            google,
        }
    }

    pub fn issue_access_token(&self, user: &User) -> Result<String> {
        let issued_at = chrono::Utc::now();
        let claims = Claims {
            id: user.id.clone(),
            admin: user.admin,
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::hours(self.config.jwt_expiry_hours)).timestamp(),
        };
        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )?)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.config.jwt_secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(token_data) => {
                debug!("JWT token verified for user: {}", token_data.claims.id);
                Ok(token_data.claims)
            }
            Err(e) => {
                debug!("JWT verification failed: {}", e);
                Err(AppError::unauthorized("Access token is invalid"))
            }
        }
    }

    pub fn issue_email_token(&self, email: &str) -> Result<String> {
        let issued_at = chrono::Utc::now();
        let claims = EmailClaims {
            email: email.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::hours(self.config.email_token_expiry_hours)).timestamp(),
        };
        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.email_token_secret.as_bytes()),
        )?)
    }

    fn verify_email_token(&self, token: &str) -> Result<EmailClaims> {
        decode::<EmailClaims>(
            token,
            &DecodingKey::from_secret(self.config.email_token_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|_| AppError::BadRequest("Token is invalid or expired".to_string()))
    }

    pub fn session(&self, user: &User) -> Result<SessionPayload> {
        Ok(SessionPayload {
            access_token: self.issue_access_token(user)?,
            profile_img: user.personal_info.profile_img.clone(),
            username: user.personal_info.username.clone(),
            fullname: user.personal_info.fullname.clone(),
            is_admin: user.admin,
        })
    }

    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("Error hashing password: {}", e)))
    }

    pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Stored password hash is malformed: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    async fn unique_username(&self, email: &str) -> Result<String> {
        let candidate = username_from_email(email, false);
        let taken = self
            .db
            .count(
                Collection::Users,
                &Filter::eq("personal_info.username", candidate.as_str()),
            )
            .await?
            > 0;
        Ok(if taken {
            username_from_email(email, true)
        } else {
            candidate
        })
    }

    fn new_user(&self, personal_info: PersonalInfo, google_auth: bool) -> User {
        let joined_at = now();
        User {
            id: Uuid::new_v4().to_string(),
            personal_info,
            social_links: Default::default(),
            account_info: Default::default(),
            google_auth,
            admin: false,
            suspend: false,
            blogs: Vec::new(),
            joined_at,
            updated_at: joined_at,
        }
    }

    /// 注册并发送验证邮件
    pub async fn signup(&self, request: SignupRequest) -> Result<User> {
        request.validate()?;
        validate_email_format(&request.email)?;
        validate_nim(&request.nim)?;
        validate_password(&request.password)?;

        let nim_taken = self
            .db
            .count(Collection::Users, &Filter::eq("personal_info.nim", request.nim.as_str()))
            .await?
            > 0;
        if nim_taken {
            return Err(AppError::validation("Student number is already registered"));
        }

        let username = self.unique_username(&request.email).await?;
        let user = self.new_user(
            PersonalInfo {
                fullname: request.fullname,
                email: request.email,
                nim: Some(request.nim),
                password: Some(Self::hash_password(&request.password)?),
                profile_img: default_profile_img(&username),
                username,
                bio: String::new(),
                is_verified: false,
            },
            false,
        );

        self.db.create(Collection::Users, &user).await.map_err(|e| {
            if e.is_duplicate() {
                AppError::conflict("Email is already registered")
            } else {
                e
            }
        })?;
        info!("User {} signed up", user.personal_info.username);

        let token = self.issue_email_token(&user.personal_info.email)?;
        self.mailer
            .send_verification(&user.personal_info.email, &self.config.verification_url(&token))
            .await?;

        Ok(user)
    }

    pub async fn verify_email(&self, token: &str) -> Result<SessionPayload> {
        let claims = self.verify_email_token(token)?;
        let previous: User = self
            .db
            .update_one(
                Collection::Users,
                &Filter::eq("personal_info.email", claims.email.as_str()),
                &Update::new().set("personal_info.is_verified", true),
            )
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        let mut user = previous;
        user.personal_info.is_verified = true;
        info!("Email verified for {}", user.personal_info.username);
        self.session(&user)
    }

    pub async fn signin(&self, request: SigninRequest) -> Result<SessionPayload> {
        let user: User = self
            .db
            .find_one(
                Collection::Users,
                &Filter::eq("personal_info.email", request.email.as_str())
                    .with(Filter::eq("personal_info.nim", request.nim.as_str())),
            )
            .await?
            .ok_or_else(|| AppError::unauthorized("Email and student number combination not found"))?;

        if user.google_auth {
            return Err(AppError::unauthorized(
                "Account was created with Google. Try signing in with Google",
            ));
        }

        let hash = user
            .personal_info
            .password
            .as_deref()
            .ok_or_else(|| AppError::unauthorized("Incorrect password"))?;
        if !Self::verify_password(&request.password, hash)? {
            return Err(AppError::unauthorized("Incorrect password"));
        }

        debug!("User {} signed in", user.personal_info.username);
        self.session(&user)
    }

    pub async fn google_auth(&self, access_token: &str) -> Result<SessionPayload> {
        let identity = self.google.verify(access_token).await?;

        if !identity.email.ends_with(&self.config.google_allowed_domain) {
            return Err(AppError::Authorization(format!(
                "You must sign in with an {} email",
                self.config.google_allowed_domain
            )));
        }

        let existing: Option<User> = self
            .db
            .find_one(
                Collection::Users,
                &Filter::eq("personal_info.email", identity.email.as_str()),
            )
            .await?;

        if let Some(user) = existing {
            if !user.google_auth {
                return Err(AppError::forbidden(
                    "This email was registered without Google. Sign in with your password",
                ));
            }
            return self.session(&user);
        }

        let username = self.unique_username(&identity.email).await?;
        let profile_img = identity
            .picture
            .as_deref()
            .map(|p| p.replace("s96-c", "s384-c"))
            .unwrap_or_else(|| default_profile_img(&username));
        let user = self.new_user(
            PersonalInfo {
                fullname: identity.name.clone().unwrap_or_else(|| username.clone()),
                email: identity.email.clone(),
                nim: None,
                password: None,
                username,
                bio: String::new(),
                profile_img,
                is_verified: true,
            },
            true,
        );
        self.db.create(Collection::Users, &user).await?;
        info!("User {} signed up with Google", user.personal_info.username);

        self.session(&user)
    }

    pub async fn change_password(&self, user_id: &str, request: ChangePasswordRequest) -> Result<()> {
        validate_password(&request.current_password)?;
        validate_password(&request.new_password)?;

        let user: User = self
            .db
            .get_by_id(Collection::Users, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        if user.google_auth {
            return Err(AppError::forbidden(
                "You can't change the account password because you signed in with Google",
            ));
        }

        let hash = user.personal_info.password.as_deref().unwrap_or_default();
        if !Self::verify_password(&request.current_password, hash)? {
            return Err(AppError::unauthorized("Incorrect current password"));
        }

        let update = Update::new()
            .set("personal_info.password", Self::hash_password(&request.new_password)?)
            .set("updatedAt", timestamp::format(&now()));
        self.db
            .update_by_id::<User>(Collection::Users, user_id, &update)
            .await?;
        info!("Password changed for {}", user.personal_info.username);
        Ok(())
    }
}

fn default_profile_img(seed: &str) -> String {
    format!(
        "https://api.dicebear.com/6.x/notionists-neutral/svg?seed={}",
        urlencoding::encode(seed)
    )
}

// Axum extractor for authentication
#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::unauthorized("No access token"))?;

        let claims = state.auth_service.verify_access_token(bearer.token())?;
        Ok(AuthUser::from(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mailer::LogMailer;

    struct FixedGoogle(GoogleIdentity);

    #[async_trait]
    impl GoogleVerifier for FixedGoogle {
        async fn verify(&self, _access_token: &str) -> Result<GoogleIdentity> {
            Ok(self.0.clone())
        }
    }

    fn service(email: &str) -> AuthService {
        AuthService::with_collaborators(
            Arc::new(Database::in_memory()),
            &Config::default(),
            Arc::new(LogMailer),
            Arc::new(FixedGoogle(GoogleIdentity {
                email: email.to_string(),
                name: Some("Siti".to_string()),
                picture: Some("https://lh3/photo=s96-c".to_string()),
            })),
        )
    }

    fn signup_request() -> SignupRequest {
        SignupRequest {
            fullname: "Budi Santoso".into(),
            email: "budi@poljan.ac.id".into(),
            nim: "213051001".into(),
            password: "Secret12".into(),
        }
    }

    #[test]
    fn password_hash_verifies() {
        let hash = AuthService::hash_password("Secret12").unwrap();
        assert!(AuthService::verify_password("Secret12", &hash).unwrap());
        assert!(!AuthService::verify_password("Secret13", &hash).unwrap());
    }

    #[tokio::test]
    async fn signup_then_signin_issues_admin_aware_token() {
        let auth = service("x@poljan.ac.id");
        let user = auth.signup(signup_request()).await.unwrap();
        assert_eq!(user.personal_info.username, "budi");

        let session = auth
            .signin(SigninRequest {
                email: "budi@poljan.ac.id".into(),
                nim: "213051001".into(),
                password: "Secret12".into(),
            })
            .await
            .unwrap();
        let claims = auth.verify_access_token(&session.access_token).unwrap();
        assert_eq!(claims.id, user.id);
        assert!(!claims.admin);
    }

    #[tokio::test]
    async fn duplicate_nim_is_rejected() {
        let auth = service("x@poljan.ac.id");
        auth.signup(signup_request()).await.unwrap();

        let mut again = signup_request();
        again.email = "other@poljan.ac.id".into();
        assert!(matches!(auth.signup(again).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let auth = service("x@poljan.ac.id");
        auth.signup(signup_request()).await.unwrap();

        let result = auth
            .signin(SigninRequest {
                email: "budi@poljan.ac.id".into(),
                nim: "213051001".into(),
                password: "Wrong123".into(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Authentication(_))));
    }

    #[tokio::test]
    async fn email_token_marks_user_verified() {
        let auth = service("x@poljan.ac.id");
        auth.signup(signup_request()).await.unwrap();

        let token = auth.issue_email_token("budi@poljan.ac.id").unwrap();
        let session = auth.verify_email(&token).await.unwrap();
        assert_eq!(session.username, "budi");
        assert!(matches!(auth.verify_email("garbage").await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn google_sign_in_enforces_domain_and_creates_account() {
        let outsider = service("someone@gmail.com");
        assert!(matches!(
            outsider.google_auth("token").await,
            Err(AppError::Authorization(_))
        ));

        let auth = service("siti@poljan.ac.id");
        let session = auth.google_auth("token").await.unwrap();
        assert_eq!(session.username, "siti");
        assert_eq!(session.profile_img, "https://lh3/photo=s384-c");

        // 第二次登录复用同一账号
        let again = auth.google_auth("token").await.unwrap();
        assert_eq!(again.username, "siti");
    }

    #[tokio::test]
    async fn google_accounts_cannot_change_password() {
        let auth = service("siti@poljan.ac.id");
        let session = auth.google_auth("token").await.unwrap();
        let claims = auth.verify_access_token(&session.access_token).unwrap();

        let result = auth
            .change_password(
                &claims.id,
                ChangePasswordRequest {
                    current_password: "Secret12".into(),
                    new_password: "Secret34".into(),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Authorization(_))));
    }
}
