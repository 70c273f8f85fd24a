use std::str::FromStr;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use kernel::model::{
    actor::{Actor, ActorRole},
    id::UserId,
};
use registry::AppRegistry;
use shared::error::AppError;

// 認証レイヤ（スコープ外）が検証済みの操作者情報をヘッダで引き渡してくる。
// コア側では資格情報を再検証せず、この内容を信頼する。
const ACTOR_ID_HEADER: &str = "x-actor-id";
const ACTOR_ROLE_HEADER: &str = "x-actor-role";

pub struct AuthorizedActor {
    pub actor: Actor,
}

impl AuthorizedActor {
    pub fn id(&self) -> UserId {
        self.actor.id
    }

    pub fn is_admin(&self) -> bool {
        self.actor.is_admin()
    }
}

#[async_trait]
impl FromRequestParts<AppRegistry> for AuthorizedActor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _registry: &AppRegistry,
    ) -> Result<Self, Self::Rejection> {
        let raw_id = parts
            .headers
            .get(ACTOR_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::UnauthenticatedError)?;
        let id = UserId::from_str(raw_id)?;

        // ロールヘッダがなければ一般利用者として扱う
        let role = match parts.headers.get(ACTOR_ROLE_HEADER) {
            Some(raw) => {
                let raw = raw.to_str().map_err(|_| AppError::UnauthenticatedError)?;
                ActorRole::from_str(raw).map_err(|_| AppError::UnauthenticatedError)?
            }
            None => ActorRole::Member,
        };

        Ok(Self {
            actor: Actor { id, role },
        })
    }
}
