//! Shared access to one source handle.
//!
//! A handle has a single current-directory cursor, so selecting a directory
//! and reading from it must happen without another caller re-pointing the
//! cursor in between. [`SharedSource`] holds the handle behind an async
//! mutex and exposes select+read as one locked operation.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::error::ContainerError;
use crate::tile::TileCoord;

use super::{DirectoryLayout, TileSource};

/// Cloneable, serialized handle to a [`TileSource`].
pub struct SharedSource<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedSource<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: TileSource> SharedSource<S> {
    pub fn new(source: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(source)),
        }
    }

    pub async fn directory_count(&self) -> usize {
        self.inner.lock().await.directory_count()
    }

    /// Layout of `directory`.
    pub async fn layout_of(&self, directory: usize) -> Result<DirectoryLayout, ContainerError> {
        let mut source = self.inner.lock().await;
        source.select_directory(directory)?;
        Ok(*source.layout()?)
    }

    /// Select `directory` and read the tile at `coord` under one lock.
    pub async fn read_tile_in(
        &self,
        directory: usize,
        coord: TileCoord,
    ) -> Result<Bytes, ContainerError> {
        let mut source = self.inner.lock().await;
        source.select_directory(directory)?;
        source.read_tile(coord.x, coord.y).await
    }

    /// Select `directory` and read one row under one lock.
    pub async fn read_scanline_in(&self, directory: usize, row: u32) -> Result<Bytes, ContainerError> {
        let mut source = self.inner.lock().await;
        source.select_directory(directory)?;
        source.read_scanline(row).await
    }

    /// Take the handle back once every clone has been dropped.
    pub fn into_inner(self) -> Option<S> {
        Arc::try_unwrap(self.inner).ok().map(Mutex::into_inner)
    }
}
