use crate::config::Config;
use crate::error::AppError;
use crate::{auth::jwt::verify_token, model::role::Role, models::TokenType};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to a staff record
    pub staff_id: Option<u64>,
}

impl AuthUser {
    /// Validates a bearer access token.
    pub fn from_token(token: &str, secret: &str) -> Result<Self, AppError> {
        let claims = verify_token(token, secret)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }

        let role = Role::from_id(claims.role)
            .ok_or_else(|| AppError::Unauthorized("Invalid role".into()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            staff_id: claims.staff_id,
        })
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // The auth middleware has usually done the work already.
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(AppError::Unauthorized("Missing token".into()))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => return ready(Err(AppError::Database("Config missing".into()))),
        };

        ready(AuthUser::from_token(token, &config.jwt_secret))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin only"))
        }
    }

    pub fn require_hr_or_admin(&self) -> Result<(), AppError> {
        if matches!(self.role, Role::Admin | Role::Hr) {
            Ok(())
        } else {
            Err(AppError::forbidden("HR/Admin only"))
        }
    }

    /// Returns true if the user is plain staff
    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }

    /// HR and Admin may act on any staff record; staff only on their own.
    pub fn require_access_to(&self, staff_id: u64) -> Result<(), AppError> {
        if !self.is_staff() {
            return Ok(());
        }
        match self.staff_id {
            Some(own) if own == staff_id => Ok(()),
            Some(_) => Err(AppError::forbidden("You can only access your own records")),
            None => Err(AppError::forbidden("No staff profile")),
        }
    }
}
