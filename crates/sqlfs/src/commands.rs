//! `init`, `verify` and `mount`.
//!
//! Each command connects, does its work and closes the pool. Errors carry
//! context for the CLI to print.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sqlfs_kernel::{ConnectionTarget, Owner, PoolConfig, SqlFs, Store};

use crate::config::MountSettings;
use crate::fuse;

async fn connect(target: &ConnectionTarget, pool: &PoolConfig) -> Result<Store> {
    Store::connect(target, pool)
        .await
        .with_context(|| format!("connecting to {target}"))
}

/// Create the schema and root directory. The root is owned by the current
/// user. Running it again on an initialized store changes nothing.
pub async fn initialize(target: &ConnectionTarget, pool: &PoolConfig) -> Result<()> {
    let store = connect(target, pool).await?;
    let result = store
        .initialize(Owner::current())
        .await
        .with_context(|| format!("initializing {target}"));
    store.close().await;
    result?;
    tracing::info!(uri = %target, "store initialized");
    Ok(())
}

/// Check that `target` holds an initialized namespace.
pub async fn verify(target: &ConnectionTarget, pool: &PoolConfig) -> Result<()> {
    let store = connect(target, pool).await?;
    let result = store
        .verify()
        .await
        .with_context(|| format!("verifying {target}"));
    store.close().await;
    let root = result?;
    tracing::info!(uri = %target, uid = root.uid, gid = root.gid, "store looks good");
    Ok(())
}

/// Verify `target`, then serve it at `mountpoint` until unmounted.
pub async fn mount(
    target: &ConnectionTarget,
    pool: &PoolConfig,
    mountpoint: &Path,
    settings: &MountSettings,
) -> Result<()> {
    let store = connect(target, pool).await?;
    store
        .verify()
        .await
        .with_context(|| format!("verifying {target} before mounting"))?;

    let fs = Arc::new(SqlFs::new(store.clone()).with_max_file_size(settings.max_file_size));
    let runtime = tokio::runtime::Handle::current();
    let mountpoint: PathBuf = mountpoint.to_path_buf();
    let settings = settings.clone();

    tracing::info!(uri = %target, mountpoint = %mountpoint.display(), "mounting");
    let served = tokio::task::spawn_blocking(move || {
        fuse::mount(fs, &mountpoint, &settings, runtime)
            .with_context(|| format!("mounting at {}", mountpoint.display()))
    })
    .await
    .context("mount thread panicked")?;

    store.close().await;
    served?;
    tracing::info!("unmounted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_target(dir: &tempfile::TempDir) -> ConnectionTarget {
        let uri = format!("sqlite://{}", dir.path().join("fs.sql").display());
        ConnectionTarget::parse(&uri).unwrap()
    }

    #[tokio::test]
    async fn test_init_then_verify() {
        let dir = tempfile::tempdir().unwrap();
        let target = sqlite_target(&dir);
        let pool = PoolConfig::default();

        initialize(&target, &pool).await.unwrap();
        initialize(&target, &pool).await.unwrap();
        verify(&target, &pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_uninitialized_fails() {
        let dir = tempfile::tempdir().unwrap();
        let target = sqlite_target(&dir);

        let err = verify(&target, &PoolConfig::default()).await.unwrap_err();
        assert!(format!("{err:#}").contains("integrity"), "{err:#}");
    }

    #[tokio::test]
    async fn test_mount_refuses_unverified_store() {
        let dir = tempfile::tempdir().unwrap();
        let target = sqlite_target(&dir);
        let mountpoint = dir.path().join("mnt");

        let err = mount(&target, &PoolConfig::default(), &mountpoint, &MountSettings::default())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("before mounting"), "{err:#}");
    }
}
