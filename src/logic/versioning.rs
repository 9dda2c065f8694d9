use log::{info, warn};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::logic::batch::{Batcher, DEFAULT_BATCH_SIZE, SCROLL_PAGE_SIZE};
use crate::model::{
    hyphenated_version_string, CodeSystem, CodeSystemVersion, Concept, Description, MetadataValue,
    ReferenceSetMember, Relationship, VersionedComponent,
};
use crate::store::{BranchCriteria, Commit, ComponentStore, Store};

/// Branch metadata key recording the release date on version branches.
pub const VERSION_EFFECTIVE_TIME_METADATA_KEY: &str = "versionEffectiveTime";

pub struct ReleaseVersioning;

impl ReleaseVersioning {
    /// Atomically stamp every unreleased component on the code system's
    /// working branch with `effective_date`, then create the release
    /// branch and version record.
    ///
    /// The effective date must be exactly 8 digits (yyyymmdd). A version
    /// with the same effective date already existing is a logged no-op.
    /// Returns the hyphenated version label.
    pub async fn create_version<S: Store>(
        store: &S,
        code_system: &CodeSystem,
        effective_date: &str,
        description: &str,
    ) -> Result<String> {
        if effective_date.len() != 8 || !effective_date.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidArgument(
                "effective date must have format yyyymmdd".to_string(),
            ));
        }
        let date: u32 = effective_date
            .parse()
            .map_err(|_| Error::InvalidArgument("effective date must have format yyyymmdd".to_string()))?;
        let version = hyphenated_version_string(date);

        if store
            .get_code_system_version(&code_system.short_name, date)
            .await?
            .is_some()
        {
            warn!(
                "Skipping code system version creation for {}: version {} already exists.",
                code_system.short_name, version
            );
            return Ok(version);
        }

        let release_branch_path = format!("{}/{}", code_system.branch_path, version);
        info!(
            "Creating code system version - code system: {}, version: {}, release branch: {}",
            code_system.short_name, version, release_branch_path
        );

        info!("Versioning content...");
        Self::release_content(store, date, &code_system.branch_path).await?;

        info!("Creating version branch...");
        store.create_branch(&release_branch_path).await?;
        store
            .update_branch_metadata(
                &release_branch_path,
                HashMap::from([(
                    VERSION_EFFECTIVE_TIME_METADATA_KEY.to_string(),
                    MetadataValue::single(effective_date),
                )]),
            )
            .await?;

        info!("Persisting code system version...");
        store
            .save_code_system_version(CodeSystemVersion::new(
                code_system,
                date,
                version.clone(),
                description,
            ))
            .await?;

        info!("Versioning complete.");
        Ok(version)
    }

    /// Stamp all unreleased components on the branch inside one commit.
    /// Any error aborts the commit, discarding every staged batch, so a
    /// failed run is safely re-runnable.
    async fn release_content<S: Store>(store: &S, effective_time: u32, path: &str) -> Result<()> {
        let commit = store.open_commit(path).await?;
        let criteria = store.branch_visibility(path).await?;
        match Self::release_all_components(store, &commit, &criteria, effective_time).await {
            Ok(()) => store.mark_successful(commit).await,
            Err(error) => {
                store.abort_commit(commit).await?;
                Err(error)
            }
        }
    }

    async fn release_all_components<S: Store>(
        store: &S,
        commit: &Commit,
        criteria: &BranchCriteria,
        effective_time: u32,
    ) -> Result<()> {
        // Fixed type order keeps runs reproducible.
        Self::release_components_of_type::<Concept, S>(store, commit, criteria, effective_time)
            .await?;
        Self::release_components_of_type::<Description, S>(store, commit, criteria, effective_time)
            .await?;
        Self::release_components_of_type::<Relationship, S>(store, commit, criteria, effective_time)
            .await?;
        Self::release_components_of_type::<ReferenceSetMember, S>(
            store,
            commit,
            criteria,
            effective_time,
        )
        .await?;
        Ok(())
    }

    /// Stream the branch-visible unreleased components of one type in
    /// stable id order, stamping and flushing in bounded batches so memory
    /// stays proportional to the batch size.
    async fn release_components_of_type<T, S>(
        store: &S,
        commit: &Commit,
        criteria: &BranchCriteria,
        effective_time: u32,
    ) -> Result<()>
    where
        T: VersionedComponent,
        S: ComponentStore<T>,
    {
        let mut released: u64 = 0;
        let mut batcher = Batcher::new(DEFAULT_BATCH_SIZE);
        let mut after: Option<String> = None;
        loop {
            let page: Vec<T> = store
                .next_unreleased_page(criteria, after.as_deref(), SCROLL_PAGE_SIZE)
                .await?;
            match page.last() {
                None => break,
                Some(last) => after = Some(last.component_id().to_string()),
            }
            for mut component in page {
                component.release(effective_time);
                component.mark_changed();
                released += 1;
                if let Some(batch) = batcher.push(component) {
                    store.save_batch(commit, batch).await?;
                }
            }
        }
        if let Some(batch) = batcher.take_remaining() {
            store.save_batch(commit, batch).await?;
        }
        info!(
            "Versioned {} {} components on '{}'.",
            released,
            T::type_name(),
            commit.branch_path()
        );
        Ok(())
    }
}
