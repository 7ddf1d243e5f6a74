use std::sync::Arc;

use movely_client::{ApiClient, RemoteDraftRepository};
use movely_core::config::AppConfig;
use movely_core::domain::draft::DraftId;
use movely_core::drafts::{DraftError, DraftStore};
use movely_db::{connect_drafts, migrations, SqlDraftRepository};
use serde_json::json;

use crate::commands::{exit, load_config, runtime, CommandResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DraftsAction {
    List,
    Show(String),
    Discard(String),
}

pub fn run(action: DraftsAction) -> CommandResult {
    let config = match load_config("drafts") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("drafts") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let store = match open_store(&config).await {
            Ok(store) => store,
            Err(failure) => return failure,
        };

        match action {
            DraftsAction::List => list(&store).await,
            DraftsAction::Show(id) => show(&store, DraftId(id)).await,
            DraftsAction::Discard(id) => discard(&store, DraftId(id)).await,
        }
    })
}

async fn open_store(config: &AppConfig) -> Result<DraftStore, CommandResult> {
    let pool = connect_drafts(&config.drafts).await.map_err(|error| {
        CommandResult::failure("drafts", "db_connectivity", error.to_string(), exit::STORAGE)
    })?;
    migrations::run_pending(&pool).await.map_err(|error| {
        CommandResult::failure("drafts", "migration", error.to_string(), exit::MIGRATION)
    })?;
    let local = Arc::new(SqlDraftRepository::new(pool));

    if !config.api.remote_drafts {
        return Ok(DraftStore::local_only(local));
    }

    let client = ApiClient::from_config(&config.api).map_err(|error| {
        CommandResult::failure("drafts", "config_validation", error.to_string(), exit::CONFIG)
    })?;
    Ok(DraftStore::with_remote(local, Arc::new(RemoteDraftRepository::new(client))))
}

async fn list(store: &DraftStore) -> CommandResult {
    match store.list().await {
        Ok(drafts) => {
            let summaries: Vec<_> = drafts
                .iter()
                .map(|draft| {
                    json!({
                        "id": draft.id,
                        "source": draft.source,
                        "revision": draft.revision,
                        "current_step": draft.current_step,
                        "updated_at": draft.updated_at,
                    })
                })
                .collect();
            CommandResult::success_with_data(
                "drafts",
                format!("{} draft(s)", summaries.len()),
                Some(json!(summaries)),
            )
        }
        Err(error) => failure(error),
    }
}

async fn show(store: &DraftStore, id: DraftId) -> CommandResult {
    match store.load(&id).await {
        Ok(Some(draft)) => CommandResult::success_with_data(
            "drafts",
            format!("draft {} at step {}", draft.id, draft.current_step),
            serde_json::to_value(&draft).ok(),
        ),
        Ok(None) => failure(DraftError::NotFound(id)),
        Err(error) => failure(error),
    }
}

async fn discard(store: &DraftStore, id: DraftId) -> CommandResult {
    match store.discard(&id).await {
        Ok(()) => CommandResult::success("drafts", format!("draft {id} discarded")),
        Err(error) => failure(error),
    }
}

fn failure(error: DraftError) -> CommandResult {
    let (error_class, exit_code) = match &error {
        DraftError::NotFound(_) => ("not_found", exit::NOT_FOUND),
        DraftError::Corrupt { .. } => ("corrupt_draft", exit::VALIDATION),
        DraftError::Storage(_) | DraftError::Unavailable(_) => ("draft_store", exit::STORAGE),
    };
    CommandResult::failure("drafts", error_class, error.to_string(), exit_code)
}
