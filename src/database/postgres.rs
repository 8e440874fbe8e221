use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use crate::database::models::{Annotation, AnnotationRow, Dragable, Team, User};
use crate::database::{EntityStore, StoreError};

/// Idempotent schema, applied at connect. The FK actions encode the cascade
/// semantics: team deletion sweeps dragables, dragable deletion sweeps its
/// annotations and any connection annotations targeting it, and dangling
/// `connected_to` back-references are nulled rather than blocking.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL DEFAULT '',
        password_digest TEXT NOT NULL,
        created TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS teams (
        name TEXT PRIMARY KEY,
        description TEXT NOT NULL DEFAULT '',
        created_by TEXT NOT NULL REFERENCES users(username),
        created TIMESTAMPTZ NOT NULL,
        public BOOLEAN NOT NULL,
        password TEXT
    )",
    "CREATE TABLE IF NOT EXISTS team_members (
        team_name TEXT NOT NULL REFERENCES teams(name) ON DELETE CASCADE ON UPDATE CASCADE,
        username TEXT NOT NULL REFERENCES users(username),
        PRIMARY KEY (team_name, username)
    )",
    "CREATE TABLE IF NOT EXISTS dragables (
        hash TEXT PRIMARY KEY,
        created_by TEXT NOT NULL REFERENCES users(username),
        team TEXT NOT NULL REFERENCES teams(name) ON DELETE CASCADE ON UPDATE CASCADE,
        created TIMESTAMPTZ NOT NULL,
        updated TIMESTAMPTZ NOT NULL,
        url TEXT NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        \"text\" TEXT NOT NULL DEFAULT '',
        xpath TEXT NOT NULL DEFAULT '',
        connected_to TEXT REFERENCES dragables(hash) ON DELETE SET NULL
    )",
    "CREATE TABLE IF NOT EXISTS annotations (
        hash TEXT PRIMARY KEY,
        dragable TEXT NOT NULL REFERENCES dragables(hash) ON DELETE CASCADE,
        created_by TEXT NOT NULL REFERENCES users(username),
        created TIMESTAMPTZ NOT NULL,
        updated TIMESTAMPTZ NOT NULL,
        kind TEXT NOT NULL,
        note TEXT,
        url TEXT,
        description TEXT,
        filename TEXT,
        connected_to TEXT REFERENCES dragables(hash) ON DELETE CASCADE
    )",
];

/// Team row without the membership set; members live in `team_members`.
#[derive(Debug, FromRow)]
struct TeamRow {
    name: String,
    description: String,
    created_by: String,
    created: DateTime<Utc>,
    public: bool,
    password: Option<String>,
}

impl TeamRow {
    fn into_team(self, members: Vec<String>) -> Team {
        Team {
            name: self.name,
            description: self.description,
            created_by: self.created_by,
            members,
            created: self.created,
            public: self.public,
            password: self.password,
        }
    }
}

/// Postgres-backed entity store
pub struct PgStore {
    pool: PgPool,
    cascade_delete: bool,
}

impl PgStore {
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connection_timeout: u64,
        cascade_delete: bool,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connection_timeout))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let store = Self {
            pool,
            cascade_delete,
        };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn team_members(&self, name: &str) -> Result<Vec<String>, StoreError> {
        let members = sqlx::query_scalar::<_, String>(
            "SELECT username FROM team_members WHERE team_name = $1 ORDER BY username",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[async_trait]
impl EntityStore for PgStore {
    async fn create_user(&self, user: User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, username, email, password_digest, created)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_digest)
        .bind(user.created)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate {
                    entity: "user",
                    key: user.username.clone(),
                }
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create_team(&self, team: Team) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO teams (name, description, created_by, created, public, password)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&team.name)
        .bind(&team.description)
        .bind(&team.created_by)
        .bind(team.created)
        .bind(team.public)
        .bind(&team.password)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate {
                    entity: "team",
                    key: team.name.clone(),
                }
            } else {
                e.into()
            }
        })?;

        for member in &team.members {
            sqlx::query(
                "INSERT INTO team_members (team_name, username)
                 VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(&team.name)
            .bind(member)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn team_by_name(&self, name: &str) -> Result<Option<Team>, StoreError> {
        let row = sqlx::query_as::<_, TeamRow>("SELECT * FROM teams WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let members = self.team_members(&row.name).await?;
                Ok(Some(row.into_team(members)))
            }
            None => Ok(None),
        }
    }

    async fn list_teams(&self) -> Result<Vec<Team>, StoreError> {
        let rows = sqlx::query_as::<_, TeamRow>("SELECT * FROM teams ORDER BY name, created")
            .fetch_all(&self.pool)
            .await?;

        let memberships = sqlx::query_as::<_, (String, String)>(
            "SELECT team_name, username FROM team_members ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_team: HashMap<String, Vec<String>> = HashMap::new();
        for (team_name, username) in memberships {
            by_team.entry(team_name).or_default().push(username);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let members = by_team.remove(&row.name).unwrap_or_default();
                row.into_team(members)
            })
            .collect())
    }

    async fn update_team(&self, name: &str, team: Team) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE teams SET name = $1, description = $2, public = $3, password = $4
             WHERE name = $5",
        )
        .bind(&team.name)
        .bind(&team.description)
        .bind(team.public)
        .bind(&team.password)
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate {
                    entity: "team",
                    key: team.name.clone(),
                }
            } else {
                e.into()
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("no team named '{}'", name)));
        }

        // Rebuild the membership set; a rename has already cascaded into
        // team_members.team_name via the FK.
        sqlx::query("DELETE FROM team_members WHERE team_name = $1")
            .bind(&team.name)
            .execute(&mut *tx)
            .await?;
        for member in &team.members {
            sqlx::query(
                "INSERT INTO team_members (team_name, username)
                 VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(&team.name)
            .bind(member)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_team(&self, name: &str) -> Result<(), StoreError> {
        if !self.cascade_delete {
            let dragables: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM dragables WHERE team = $1")
                    .bind(name)
                    .fetch_one(&self.pool)
                    .await?;
            if dragables > 0 {
                return Err(StoreError::Constraint(format!(
                    "team '{}' still has dragables",
                    name
                )));
            }
        }

        let result = sqlx::query("DELETE FROM teams WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("no team named '{}'", name)));
        }
        Ok(())
    }

    async fn create_dragable(&self, dragable: Dragable) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO dragables
                (hash, created_by, team, created, updated, url, title, \"text\", xpath, connected_to)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&dragable.hash)
        .bind(&dragable.created_by)
        .bind(&dragable.team)
        .bind(dragable.created)
        .bind(dragable.updated)
        .bind(&dragable.url)
        .bind(&dragable.title)
        .bind(&dragable.text)
        .bind(&dragable.xpath)
        .bind(&dragable.connected_to)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate {
                    entity: "dragable",
                    key: dragable.hash.clone(),
                }
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn dragable_by_hash(&self, hash: &str) -> Result<Option<Dragable>, StoreError> {
        let dragable = sqlx::query_as::<_, Dragable>("SELECT * FROM dragables WHERE hash = $1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(dragable)
    }

    async fn dragables_for_member(&self, username: &str) -> Result<Vec<Dragable>, StoreError> {
        let dragables = sqlx::query_as::<_, Dragable>(
            "SELECT d.* FROM dragables d
             JOIN team_members m ON m.team_name = d.team
             WHERE m.username = $1
             ORDER BY d.created, d.hash",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;
        Ok(dragables)
    }

    async fn dragables_in_team(&self, team: &str) -> Result<Vec<Dragable>, StoreError> {
        let dragables = sqlx::query_as::<_, Dragable>(
            "SELECT * FROM dragables WHERE team = $1 ORDER BY created, hash",
        )
        .bind(team)
        .fetch_all(&self.pool)
        .await?;
        Ok(dragables)
    }

    async fn update_dragable(&self, dragable: Dragable) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE dragables
             SET team = $1, updated = $2, url = $3, title = $4, \"text\" = $5,
                 xpath = $6, connected_to = $7
             WHERE hash = $8",
        )
        .bind(&dragable.team)
        .bind(dragable.updated)
        .bind(&dragable.url)
        .bind(&dragable.title)
        .bind(&dragable.text)
        .bind(&dragable.xpath)
        .bind(&dragable.connected_to)
        .bind(&dragable.hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "no dragable with hash '{}'",
                dragable.hash
            )));
        }
        Ok(())
    }

    async fn delete_dragable(&self, hash: &str) -> Result<(), StoreError> {
        if !self.cascade_delete {
            let annotations: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM annotations WHERE dragable = $1")
                    .bind(hash)
                    .fetch_one(&self.pool)
                    .await?;
            if annotations > 0 {
                return Err(StoreError::Constraint(format!(
                    "dragable '{}' still has annotations",
                    hash
                )));
            }
        }

        let result = sqlx::query("DELETE FROM dragables WHERE hash = $1")
            .bind(hash)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "no dragable with hash '{}'",
                hash
            )));
        }
        Ok(())
    }

    async fn create_annotation(&self, annotation: Annotation) -> Result<(), StoreError> {
        let row = AnnotationRow::from(&annotation);
        sqlx::query(
            "INSERT INTO annotations
                (hash, dragable, created_by, created, updated, kind,
                 note, url, description, filename, connected_to)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&row.hash)
        .bind(&row.dragable)
        .bind(&row.created_by)
        .bind(row.created)
        .bind(row.updated)
        .bind(&row.kind)
        .bind(&row.note)
        .bind(&row.url)
        .bind(&row.description)
        .bind(&row.filename)
        .bind(&row.connected_to)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate {
                    entity: "annotation",
                    key: row.hash.clone(),
                }
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn annotation_by_hash(&self, hash: &str) -> Result<Option<Annotation>, StoreError> {
        let row = sqlx::query_as::<_, AnnotationRow>("SELECT * FROM annotations WHERE hash = $1")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Annotation::try_from).transpose()
    }

    async fn annotations_for_member(&self, username: &str) -> Result<Vec<Annotation>, StoreError> {
        let rows = sqlx::query_as::<_, AnnotationRow>(
            "SELECT a.* FROM annotations a
             JOIN dragables d ON d.hash = a.dragable
             JOIN team_members m ON m.team_name = d.team
             WHERE m.username = $1
             ORDER BY a.created, a.hash",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Annotation::try_from).collect()
    }

    async fn annotations_for_dragable(&self, dragable: &str) -> Result<Vec<Annotation>, StoreError> {
        let rows = sqlx::query_as::<_, AnnotationRow>(
            "SELECT * FROM annotations WHERE dragable = $1 ORDER BY created, hash",
        )
        .bind(dragable)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Annotation::try_from).collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
