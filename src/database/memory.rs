use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::database::models::{Annotation, AnnotationBody, Dragable, Team, User};
use crate::database::{EntityStore, StoreError};

#[derive(Default)]
struct Tables {
    /// Users by username.
    users: HashMap<String, User>,
    /// Teams by name.
    teams: HashMap<String, Team>,
    /// Dragables by hash.
    dragables: HashMap<String, Dragable>,
    /// Annotations by hash.
    annotations: HashMap<String, Annotation>,
}

/// In-memory store used for development runs (`MINDDRAG_STORE=memory`) and
/// the integration suite. Mirrors the relational backend's uniqueness and
/// cascade semantics; the RwLock gives the same per-record atomicity.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    cascade_delete: bool,
}

impl MemoryStore {
    pub fn new(cascade_delete: bool) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            cascade_delete,
        }
    }
}

fn member_team_names(tables: &Tables, username: &str) -> HashSet<String> {
    tables
        .teams
        .values()
        .filter(|team| team.is_member(username))
        .map(|team| team.name.clone())
        .collect()
}

/// Remove a dragable plus everything hanging off it: its annotations,
/// connection annotations pointing at it, and `connected_to` back-references
/// on other dragables.
fn purge_dragable(tables: &mut Tables, hash: &str) {
    tables.dragables.remove(hash);
    tables.annotations.retain(|_, annotation| {
        if annotation.dragable == hash {
            return false;
        }
        !matches!(&annotation.body, AnnotationBody::Connection { connected_to } if connected_to == hash)
    });
    for dragable in tables.dragables.values_mut() {
        if dragable.connected_to.as_deref() == Some(hash) {
            dragable.connected_to = None;
        }
    }
}

fn sorted_by_created(mut dragables: Vec<Dragable>) -> Vec<Dragable> {
    dragables.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.hash.cmp(&b.hash)));
    dragables
}

fn sorted_annotations(mut annotations: Vec<Annotation>) -> Vec<Annotation> {
    annotations.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.hash.cmp(&b.hash)));
    annotations
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn create_user(&self, user: User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&user.username) {
            return Err(StoreError::Duplicate {
                entity: "user",
                key: user.username,
            });
        }
        tables.users.insert(user.username.clone(), user);
        Ok(())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(username).cloned())
    }

    async fn create_team(&self, team: Team) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.teams.contains_key(&team.name) {
            return Err(StoreError::Duplicate {
                entity: "team",
                key: team.name,
            });
        }
        tables.teams.insert(team.name.clone(), team);
        Ok(())
    }

    async fn team_by_name(&self, name: &str) -> Result<Option<Team>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.teams.get(name).cloned())
    }

    async fn list_teams(&self) -> Result<Vec<Team>, StoreError> {
        let tables = self.tables.read().await;
        let mut teams: Vec<Team> = tables.teams.values().cloned().collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.created.cmp(&b.created)));
        Ok(teams)
    }

    async fn update_team(&self, name: &str, team: Team) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.teams.contains_key(name) {
            return Err(StoreError::NotFound(format!("no team named '{}'", name)));
        }
        if team.name != name && tables.teams.contains_key(&team.name) {
            return Err(StoreError::Duplicate {
                entity: "team",
                key: team.name,
            });
        }
        tables.teams.remove(name);
        if team.name != name {
            // Renames follow through to the dragables that reference the team
            for dragable in tables.dragables.values_mut() {
                if dragable.team == name {
                    dragable.team = team.name.clone();
                }
            }
        }
        tables.teams.insert(team.name.clone(), team);
        Ok(())
    }

    async fn delete_team(&self, name: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.teams.contains_key(name) {
            return Err(StoreError::NotFound(format!("no team named '{}'", name)));
        }
        let member_dragables: Vec<String> = tables
            .dragables
            .values()
            .filter(|d| d.team == name)
            .map(|d| d.hash.clone())
            .collect();
        if !self.cascade_delete && !member_dragables.is_empty() {
            return Err(StoreError::Constraint(format!(
                "team '{}' still has dragables",
                name
            )));
        }
        for hash in member_dragables {
            purge_dragable(&mut tables, &hash);
        }
        tables.teams.remove(name);
        Ok(())
    }

    async fn create_dragable(&self, dragable: Dragable) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.dragables.contains_key(&dragable.hash) {
            return Err(StoreError::Duplicate {
                entity: "dragable",
                key: dragable.hash,
            });
        }
        tables.dragables.insert(dragable.hash.clone(), dragable);
        Ok(())
    }

    async fn dragable_by_hash(&self, hash: &str) -> Result<Option<Dragable>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.dragables.get(hash).cloned())
    }

    async fn dragables_for_member(&self, username: &str) -> Result<Vec<Dragable>, StoreError> {
        let tables = self.tables.read().await;
        let team_names = member_team_names(&tables, username);
        let dragables = tables
            .dragables
            .values()
            .filter(|d| team_names.contains(&d.team))
            .cloned()
            .collect();
        Ok(sorted_by_created(dragables))
    }

    async fn dragables_in_team(&self, team: &str) -> Result<Vec<Dragable>, StoreError> {
        let tables = self.tables.read().await;
        let dragables = tables
            .dragables
            .values()
            .filter(|d| d.team == team)
            .cloned()
            .collect();
        Ok(sorted_by_created(dragables))
    }

    async fn update_dragable(&self, dragable: Dragable) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.dragables.contains_key(&dragable.hash) {
            return Err(StoreError::NotFound(format!(
                "no dragable with hash '{}'",
                dragable.hash
            )));
        }
        tables.dragables.insert(dragable.hash.clone(), dragable);
        Ok(())
    }

    async fn delete_dragable(&self, hash: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.dragables.contains_key(hash) {
            return Err(StoreError::NotFound(format!(
                "no dragable with hash '{}'",
                hash
            )));
        }
        if !self.cascade_delete {
            let has_annotations = tables.annotations.values().any(|a| a.dragable == hash);
            if has_annotations {
                return Err(StoreError::Constraint(format!(
                    "dragable '{}' still has annotations",
                    hash
                )));
            }
        }
        purge_dragable(&mut tables, hash);
        Ok(())
    }

    async fn create_annotation(&self, annotation: Annotation) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.annotations.contains_key(&annotation.hash) {
            return Err(StoreError::Duplicate {
                entity: "annotation",
                key: annotation.hash,
            });
        }
        tables
            .annotations
            .insert(annotation.hash.clone(), annotation);
        Ok(())
    }

    async fn annotation_by_hash(&self, hash: &str) -> Result<Option<Annotation>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.annotations.get(hash).cloned())
    }

    async fn annotations_for_member(&self, username: &str) -> Result<Vec<Annotation>, StoreError> {
        let tables = self.tables.read().await;
        let team_names = member_team_names(&tables, username);
        let visible_dragables: HashSet<&str> = tables
            .dragables
            .values()
            .filter(|d| team_names.contains(&d.team))
            .map(|d| d.hash.as_str())
            .collect();
        let annotations = tables
            .annotations
            .values()
            .filter(|a| visible_dragables.contains(a.dragable.as_str()))
            .cloned()
            .collect();
        Ok(sorted_annotations(annotations))
    }

    async fn annotations_for_dragable(&self, dragable: &str) -> Result<Vec<Annotation>, StoreError> {
        let tables = self.tables.read().await;
        let annotations = tables
            .annotations
            .values()
            .filter(|a| a.dragable == dragable)
            .cloned()
            .collect();
        Ok(sorted_annotations(annotations))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
