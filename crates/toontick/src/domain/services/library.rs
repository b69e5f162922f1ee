use std::collections::HashSet;

use chrono::Utc;
use itertools::Itertools;
use thiserror::Error;

use crate::domain::{
    entities::{
        library::{
            CleanupReport, GuestEntry, LibraryItem, LibraryPatch, ManhwaId, ManhwaItem,
            NewLibraryItem, ReadingStatus, StoredItem, clamp_progress, normalize_status, title_key,
        },
        session::SessionEvent,
    },
    repositories::{
        guest::{GuestLibraryError, GuestLibraryRepository},
        library::{LibraryRepository, LibraryRepositoryError},
    },
};

const SETUP_TEST_ID: &str = "test-setup-check";
const SETUP_TEST_TITLE: &str = "Setup Test Item";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Duplicate,
    AuthRequired,
    StoreUnavailable,
    Permission,
    NotFound,
    Internal,
}

/// Library failures. `Display` is the text shown to the user; backend
/// detail only reaches the log.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("{0}")]
    Validation(String),
    #[error("{}", duplicate_message(.title, .possible_id_mismatch))]
    Duplicate {
        title: String,
        possible_id_mismatch: bool,
    },
    #[error("sign in to manage your library")]
    AuthRequired,
    #[error("{}", unavailable_message(.setup_required))]
    StoreUnavailable { setup_required: bool },
    #[error("permission denied, please sign in again")]
    Permission,
    #[error("{0} is not in your library")]
    NotFound(ManhwaId),
    #[error("failed to read the guest library")]
    Guest(#[from] GuestLibraryError),
    #[error("failed to update library, please try again")]
    Store(#[source] LibraryRepositoryError),
}

fn duplicate_message(title: &str, possible_id_mismatch: &bool) -> String {
    if *possible_id_mismatch {
        format!("\"{title}\" is already in your library (possibly with different ID)")
    } else {
        format!("{title} is already in your library")
    }
}

/// Names the column behind a CHECK failure, sqlite reports the constraint name.
fn constraint_message(msg: &str) -> String {
    if msg.contains("user_library_status_check") {
        format!(
            "invalid value, status must be one of: {}",
            ReadingStatus::ALL.iter().map(|s| s.as_str()).join(", ")
        )
    } else if msg.contains("user_library_progress_check") {
        "invalid value, progress cannot be negative".to_string()
    } else {
        "invalid value rejected by the library".to_string()
    }
}

fn unavailable_message(setup_required: &bool) -> &'static str {
    if *setup_required {
        "library table does not exist, run the database migrations (toontick doctor) to set it up"
    } else {
        "library is temporarily unavailable, please try again"
    }
}

impl LibraryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LibraryError::Validation(_) => ErrorKind::Validation,
            LibraryError::Duplicate { .. } => ErrorKind::Duplicate,
            LibraryError::AuthRequired => ErrorKind::AuthRequired,
            LibraryError::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            LibraryError::Permission => ErrorKind::Permission,
            LibraryError::NotFound(_) => ErrorKind::NotFound,
            LibraryError::Guest(_) | LibraryError::Store(_) => ErrorKind::Internal,
        }
    }

    /// Duplicates are a notice, there is nothing left to do.
    pub fn is_warning(&self) -> bool {
        self.kind() == ErrorKind::Duplicate
    }

    fn duplicate(title: &str, possible_id_mismatch: bool) -> Self {
        LibraryError::Duplicate {
            title: title.to_string(),
            possible_id_mismatch,
        }
    }
}

impl From<LibraryRepositoryError> for LibraryError {
    fn from(e: LibraryRepositoryError) -> Self {
        error!("library store error: {e}");
        match e {
            LibraryRepositoryError::Duplicate => LibraryError::duplicate("This title", false),
            LibraryRepositoryError::MissingTable(_) => LibraryError::StoreUnavailable {
                setup_required: true,
            },
            LibraryRepositoryError::Unreachable(_) => LibraryError::StoreUnavailable {
                setup_required: false,
            },
            LibraryRepositoryError::PermissionDenied(_) => LibraryError::Permission,
            LibraryRepositoryError::ConstraintViolation(msg) => {
                LibraryError::Validation(constraint_message(&msg))
            }
            e @ LibraryRepositoryError::DbError(_) => LibraryError::Store(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    ReadLibrary,
    InsertTestItem,
    DeleteTestItem,
}

#[derive(Debug)]
pub enum SetupReport {
    Ready { entries: usize },
    Failed { stage: SetupStage, error: LibraryError },
}

/// Which backing store an operation goes to.
enum ActiveStore<'a> {
    Guest,
    Account(&'a str),
}

/// Single authority for library mutations. Guest visitors write to the
/// guest slot, signed-in users to their account library.
pub struct LibraryService<R, G>
where
    R: LibraryRepository,
    G: GuestLibraryRepository,
{
    repo: R,
    guest: G,
}

impl<R, G> LibraryService<R, G>
where
    R: LibraryRepository,
    G: GuestLibraryRepository,
{
    pub fn new(repo: R, guest: G) -> Self {
        Self { repo, guest }
    }

    fn store_for<'a>(&self, user_id: Option<&'a str>) -> ActiveStore<'a> {
        match user_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(user_id) => ActiveStore::Account(user_id),
            None => ActiveStore::Guest,
        }
    }

    fn require_user<'a>(&self, user_id: Option<&'a str>) -> Result<&'a str, LibraryError> {
        match self.store_for(user_id) {
            ActiveStore::Account(user_id) => Ok(user_id),
            ActiveStore::Guest => Err(LibraryError::AuthRequired),
        }
    }

    pub async fn get_library(&self, user_id: Option<&str>) -> Result<Vec<StoredItem>, LibraryError> {
        let items = match self.store_for(user_id) {
            ActiveStore::Guest => self
                .guest
                .load()
                .await?
                .into_iter()
                .map(StoredItem::Guest)
                .collect(),
            ActiveStore::Account(user_id) => self
                .repo
                .get_library(user_id)
                .await?
                .into_iter()
                .map(StoredItem::Account)
                .collect(),
        };

        Ok(items)
    }

    pub async fn add(
        &self,
        user_id: Option<&str>,
        item: ManhwaItem,
    ) -> Result<StoredItem, LibraryError> {
        if item.id.is_empty() || item.title.trim().is_empty() {
            return Err(LibraryError::Validation(
                "valid manhwa item with an id and a title is required".to_string(),
            ));
        }

        match self.store_for(user_id) {
            ActiveStore::Guest => self.add_guest(item).await.map(StoredItem::Guest),
            ActiveStore::Account(user_id) => {
                self.add_account(user_id, item).await.map(StoredItem::Account)
            }
        }
    }

    async fn add_guest(&self, item: ManhwaItem) -> Result<GuestEntry, LibraryError> {
        let mut entries = self.guest.load().await?;

        let key = title_key(&item.title);
        if let Some(existing) = entries
            .iter()
            .find(|entry| entry.id == item.id || title_key(&entry.title) == key)
        {
            warn!(
                "{} already in guest library as {}",
                item.title, existing.id
            );
            return Err(LibraryError::duplicate(&item.title, existing.id != item.id));
        }

        let entry = GuestEntry {
            id: item.id,
            title: item.title,
            image: item.image,
            status: Some(ReadingStatus::Reading.to_string()),
            progress: item.progress.map(|p| clamp_progress(p, item.chapters)),
            chapters: item.chapters,
            average_score: item.average_score,
            popularity: item.popularity,
            year: item.year,
            created_at: Some(Utc::now()),
        };

        entries.push(entry.clone());
        self.guest.save(&entries).await?;

        Ok(entry)
    }

    async fn add_account(
        &self,
        user_id: &str,
        item: ManhwaItem,
    ) -> Result<LibraryItem, LibraryError> {
        debug!(
            "checking if {} ({}) is already in library of {user_id}",
            item.title, item.id
        );

        if let Some(existing) = self.repo.get_by_manhwa_id(user_id, &item.id).await? {
            warn!("{} already in library by id", existing.title);
            return Err(LibraryError::duplicate(&item.title, false));
        }

        // the same title can arrive under different ids from different sources
        match self.repo.get_by_title(user_id, item.title.trim()).await {
            Ok(existing) if !existing.is_empty() => {
                warn!(
                    "{} already in library by title as {}",
                    item.title, existing[0].manhwa_id
                );
                return Err(LibraryError::duplicate(&item.title, true));
            }
            Ok(_) => {}
            Err(e) => warn!("title check failed, relying on id check: {e}"),
        }

        let title = item.title.clone();
        let new_item = NewLibraryItem::from_item(user_id, item, Utc::now());

        debug!(
            "adding {} to library with status {}",
            new_item.title, new_item.status
        );

        // the unique key is what actually keeps concurrent adds from both landing
        match self.repo.insert(&new_item).await {
            Ok(item) => Ok(item),
            Err(LibraryRepositoryError::Duplicate) => {
                warn!("{title} inserted concurrently");
                Err(LibraryError::duplicate(&title, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove(
        &self,
        user_id: Option<&str>,
        manhwa_id: &ManhwaId,
    ) -> Result<(), LibraryError> {
        let user_id = self.require_user(user_id)?;

        self.repo.delete(user_id, manhwa_id).await?;

        Ok(())
    }

    /// Applies `patch` and stamps `updated_at`. Marking a title completed does
    /// not touch progress, callers send both fields when they want that.
    pub async fn update(
        &self,
        user_id: Option<&str>,
        manhwa_id: &ManhwaId,
        patch: LibraryPatch,
    ) -> Result<LibraryItem, LibraryError> {
        let user_id = self.require_user(user_id)?;

        let mut item = self
            .repo
            .get_by_manhwa_id(user_id, manhwa_id)
            .await?
            .ok_or_else(|| LibraryError::NotFound(manhwa_id.clone()))?;

        if let Some(status) = patch.status.as_deref() {
            item.status = normalize_status(status);
        }
        if let Some(chapters) = patch.chapters {
            item.chapters = Some(chapters);
        }
        if let Some(title) = patch.title {
            item.title = title;
        }
        if patch.image.is_some() {
            item.image = patch.image;
        }
        if patch.average_score.is_some() {
            item.average_score = patch.average_score;
        }
        if patch.popularity.is_some() {
            item.popularity = patch.popularity;
        }
        if patch.year.is_some() {
            item.year = patch.year;
        }
        item.progress = clamp_progress(patch.progress.unwrap_or(item.progress), item.chapters);
        item.updated_at = Utc::now();

        self.repo
            .update(&item)
            .await?
            .ok_or_else(|| LibraryError::NotFound(manhwa_id.clone()))
    }

    /// Never fails: guests and store errors read as "not present".
    pub async fn is_present(&self, user_id: Option<&str>, manhwa_id: &ManhwaId) -> bool {
        let ActiveStore::Account(user_id) = self.store_for(user_id) else {
            return false;
        };

        match self.repo.get_by_manhwa_id(user_id, manhwa_id).await {
            Ok(item) => item.is_some(),
            Err(e) => {
                error!("error checking library status: {e}");
                false
            }
        }
    }

    /// Moves guest entries into the account library of `user_id` and clears
    /// the guest slot. Safe to run again or concurrently: rows are upserted.
    pub async fn migrate(&self, user_id: &str) -> Result<Vec<LibraryItem>, LibraryError> {
        let user_id = self.require_user(Some(user_id))?;

        let local = self.guest.load().await?;
        let existing = self.repo.get_library(user_id).await?;

        if local.is_empty() {
            return Ok(existing);
        }

        info!(
            "migrating guest library: {} local, {} in account",
            local.len(),
            existing.len()
        );

        let now = Utc::now();
        let existing_ids: HashSet<&ManhwaId> = existing.iter().map(|item| &item.manhwa_id).collect();
        let pending: Vec<NewLibraryItem> = local
            .into_iter()
            .filter(|entry| {
                if entry.id.is_empty() || entry.title.trim().is_empty() {
                    warn!("skipping malformed guest entry {entry:?}");
                    return false;
                }
                !existing_ids.contains(&entry.id)
            })
            .map(|entry| NewLibraryItem::from_guest(user_id, entry, now))
            .collect();

        if pending.is_empty() {
            info!("all guest entries already in account, clearing guest library");
            self.guest.clear().await?;
            return Ok(existing);
        }

        match self.repo.upsert(&pending).await {
            Ok(inserted) => {
                info!("migrated {} guest entries", inserted.len());
                self.guest.clear().await?;

                let mut library = existing;
                library.extend(inserted);
                Ok(library)
            }
            Err(LibraryRepositoryError::Duplicate) => {
                warn!("duplicate key during migration, treating guest library as migrated");
                self.guest.clear().await?;
                Ok(self.repo.get_library(user_id).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Keeps the oldest row of every group sharing a title and deletes the rest.
    pub async fn cleanup_duplicates(&self, user_id: &str) -> Result<CleanupReport, LibraryError> {
        let user_id = self.require_user(Some(user_id))?;

        let library = self.repo.get_library(user_id).await?;

        let duplicates: Vec<LibraryItem> = library
            .into_iter()
            .into_group_map_by(|item| title_key(&item.title))
            .into_values()
            .filter(|group| group.len() > 1)
            .flat_map(|group| {
                group
                    .into_iter()
                    .sorted_by_key(|item| (item.created_at, item.id))
                    .skip(1)
            })
            .sorted_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)))
            .collect();

        let mut report = CleanupReport {
            duplicates_found: duplicates.len(),
            ..Default::default()
        };

        for duplicate in duplicates {
            match self.repo.delete_by_id(user_id, duplicate.id).await {
                Ok(true) => {
                    debug!("removed duplicate {} ({})", duplicate.title, duplicate.manhwa_id);
                    report.duplicates_removed += 1;
                }
                Ok(false) => warn!("duplicate {} already gone", duplicate.title),
                Err(e) => error!("failed to remove duplicate {}: {e}", duplicate.title),
            }
            report.details.push((duplicate.title, duplicate.manhwa_id));
        }

        info!(
            "cleanup complete: {}/{} duplicates removed",
            report.duplicates_removed, report.duplicates_found
        );

        Ok(report)
    }

    /// Walks the account store through a read, a test row insert and its removal.
    pub async fn check_setup(&self, user_id: &str) -> SetupReport {
        let user_id = match self.require_user(Some(user_id)) {
            Ok(user_id) => user_id,
            Err(error) => {
                return SetupReport::Failed {
                    stage: SetupStage::ReadLibrary,
                    error,
                };
            }
        };

        let entries = match self.repo.get_library(user_id).await {
            Ok(library) => library.len(),
            Err(e) => {
                return SetupReport::Failed {
                    stage: SetupStage::ReadLibrary,
                    error: e.into(),
                };
            }
        };

        let test_item = NewLibraryItem::from_item(
            user_id,
            ManhwaItem {
                id: ManhwaId::new(SETUP_TEST_ID),
                title: SETUP_TEST_TITLE.to_string(),
                ..Default::default()
            },
            Utc::now(),
        );

        if let Err(e) = self.repo.upsert(std::slice::from_ref(&test_item)).await {
            return SetupReport::Failed {
                stage: SetupStage::InsertTestItem,
                error: e.into(),
            };
        }

        if let Err(e) = self.repo.delete(user_id, &test_item.manhwa_id).await {
            return SetupReport::Failed {
                stage: SetupStage::DeleteTestItem,
                error: e.into(),
            };
        }

        SetupReport::Ready { entries }
    }

    pub async fn clear_guest_library(&self) -> Result<(), LibraryError> {
        self.guest.clear().await?;

        Ok(())
    }

    /// Sign-in migrates the guest library and returns the account library;
    /// sign-out wipes whatever guest data is left.
    pub async fn handle_session_event(
        &self,
        event: &SessionEvent,
    ) -> Result<Option<Vec<LibraryItem>>, LibraryError> {
        match event {
            SessionEvent::SignedIn(user_id) => self.migrate(user_id).await.map(Some),
            SessionEvent::SignedOut => {
                self.clear_guest_library().await?;
                Ok(None)
            }
            SessionEvent::TokenRefreshed(session) => {
                debug!("session refreshed for {}", session.user_id);
                Ok(None)
            }
        }
    }
}
