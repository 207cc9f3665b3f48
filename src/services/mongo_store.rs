use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use mongodb::{
    bson::{self, doc},
    options::FindOptions,
    Collection, Database,
};
use serde::{Deserialize, Serialize};

use super::persistence::PersistenceGateway;
use crate::{
    error::{AppError, AppResult},
    models::{
        CanonicalRequest, ConditionPayload, Direction, RequestContent, RequestId, SubscriberId,
        Symbol, User, UserRequest,
    },
};

const REQUESTS: &str = "requests";
const USERS: &str = "users";

// One document per canonical request, holders embedded, so that every
// gateway call below is a single-document (atomic) write.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RequestDocument {
    #[serde(rename = "_id")]
    id: i64,
    symbol: Symbol,
    payload: ConditionPayload,
    direction: Direction,
    created_at: i64,
    subscribers: Vec<HolderDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HolderDocument {
    user_id: i64,
    created_at: i64,
    updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id")]
    id: i64,
    firstname: String,
    surname: String,
    username: String,
    #[serde(default)]
    ban: bool,
    created: i64,
    updated: i64,
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

impl HolderDocument {
    fn new(subscriber: SubscriberId, request: &UserRequest) -> Self {
        Self {
            user_id: subscriber.0,
            created_at: request.created_at.timestamp_millis(),
            updated_at: request.updated_at.timestamp_millis(),
        }
    }
}

impl RequestDocument {
    fn content(&self) -> RequestContent {
        RequestContent::new(self.symbol.clone(), self.payload, self.direction)
    }
}

impl From<&User> for UserDocument {
    fn from(u: &User) -> Self {
        Self {
            id: u.user_id.0,
            firstname: u.firstname.clone(),
            surname: u.surname.clone(),
            username: u.username.clone(),
            ban: u.ban,
            created: u.created.timestamp_millis(),
            updated: u.updated.timestamp_millis(),
        }
    }
}

impl From<UserDocument> for User {
    fn from(d: UserDocument) -> Self {
        Self {
            user_id: SubscriberId(d.id),
            firstname: d.firstname,
            surname: d.surname,
            username: d.username,
            ban: d.ban,
            created: from_millis(d.created),
            updated: from_millis(d.updated),
        }
    }
}

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn requests(&self) -> Collection<RequestDocument> {
        self.db.collection::<RequestDocument>(REQUESTS)
    }

    fn users(&self) -> Collection<UserDocument> {
        self.db.collection::<UserDocument>(USERS)
    }
}

#[async_trait]
impl PersistenceGateway for MongoStore {
    async fn load_all_requests(&self) -> AppResult<Vec<(SubscriberId, UserRequest)>> {
        let opts = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let mut cursor = self.requests().find(doc! {}, opts).await?;

        let mut rows = Vec::new();
        while let Some(item) = cursor.next().await {
            let d = item?;
            let content = d.content();
            for h in &d.subscribers {
                rows.push((
                    SubscriberId(h.user_id),
                    UserRequest {
                        id: RequestId(d.id),
                        content: content.clone(),
                        created_at: from_millis(h.created_at),
                        updated_at: from_millis(h.updated_at),
                    },
                ));
            }
        }
        Ok(rows)
    }

    async fn find_request(&self, id: RequestId) -> AppResult<Option<CanonicalRequest>> {
        let found = self.requests().find_one(doc! { "_id": id.0 }, None).await?;
        Ok(found.map(|d| CanonicalRequest {
            id: RequestId(d.id),
            content: d.content(),
        }))
    }

    async fn insert_request(&self, subscriber: SubscriberId, request: &UserRequest) -> AppResult<()> {
        let d = RequestDocument {
            id: request.id.0,
            symbol: request.content.symbol.clone(),
            payload: request.content.payload,
            direction: request.content.direction,
            created_at: request.created_at.timestamp_millis(),
            subscribers: vec![HolderDocument::new(subscriber, request)],
        };
        self.requests().insert_one(&d, None).await?;
        Ok(())
    }

    async fn insert_subscriber_link(
        &self,
        subscriber: SubscriberId,
        request: &UserRequest,
    ) -> AppResult<()> {
        let holder = bson::to_bson(&HolderDocument::new(subscriber, request))?;
        let res = self
            .requests()
            .update_one(
                doc! { "_id": request.id.0, "subscribers.user_id": { "$ne": subscriber.0 } },
                doc! { "$push": { "subscribers": holder } },
                None,
            )
            .await?;

        if res.matched_count == 0 {
            // Either already linked (fine) or the row is gone (not fine).
            let exists = self
                .requests()
                .count_documents(doc! { "_id": request.id.0 }, None)
                .await?;
            if exists == 0 {
                return Err(AppError::Persistence(format!(
                    "request {} missing from storage",
                    request.id
                )));
            }
        }
        Ok(())
    }

    async fn delete_request(&self, subscriber: SubscriberId, id: RequestId) -> AppResult<()> {
        // Last holder: drop the whole row in one write.
        let res = self
            .requests()
            .delete_one(
                doc! {
                    "_id": id.0,
                    "subscribers": { "$size": 1 },
                    "subscribers.user_id": subscriber.0,
                },
                None,
            )
            .await?;
        if res.deleted_count == 1 {
            return Ok(());
        }

        let res = self
            .requests()
            .update_one(
                doc! { "_id": id.0, "subscribers.user_id": subscriber.0 },
                doc! { "$pull": { "subscribers": { "user_id": subscriber.0 } } },
                None,
            )
            .await?;
        if res.matched_count == 0 {
            return Err(AppError::NotFound(format!(
                "request {id} has no stored holder {subscriber}"
            )));
        }
        Ok(())
    }

    async fn load_all_users(&self) -> AppResult<Vec<User>> {
        let mut cursor = self.users().find(doc! {}, None).await?;
        let mut users = Vec::new();
        while let Some(item) = cursor.next().await {
            users.push(User::from(item?));
        }
        Ok(users)
    }

    async fn insert_user(&self, user: &User) -> AppResult<()> {
        self.users().insert_one(UserDocument::from(user), None).await?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> AppResult<()> {
        let res = self
            .users()
            .update_one(
                doc! { "_id": user.user_id.0 },
                doc! { "$set": {
                    "firstname": user.firstname.clone(),
                    "surname": user.surname.clone(),
                    "username": user.username.clone(),
                    "ban": user.ban,
                    "updated": user.updated.timestamp_millis(),
                } },
                None,
            )
            .await?;
        if res.matched_count == 0 {
            return Err(AppError::Persistence(format!(
                "user {} missing from storage",
                user.user_id
            )));
        }
        Ok(())
    }

    async fn delete_user(&self, id: SubscriberId) -> AppResult<()> {
        self.users().delete_one(doc! { "_id": id.0 }, None).await?;

        // Sweep links a crash during cascade may have left behind.
        self.requests()
            .update_many(
                doc! { "subscribers.user_id": id.0 },
                doc! { "$pull": { "subscribers": { "user_id": id.0 } } },
                None,
            )
            .await?;
        self.requests()
            .delete_many(doc! { "subscribers": { "$size": 0 } }, None)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "mongo"
    }
}
