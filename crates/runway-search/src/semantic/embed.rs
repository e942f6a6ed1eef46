use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use runway_core::db::catalog::{EmbeddingState, embedding_states, set_embedder_id, store_embeddings};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::embedder::{Embedder, check_output};
use crate::normalize::normalize_query;

const BATCH_SIZE: usize = 64;

/// Outcome of one indexing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub scanned: usize,
    pub embedded: usize,
    pub skipped: usize,
}

/// Computes name/city vectors and writes them back to the catalog.
///
/// A row is (re-)embedded when a vector is missing or its stored hash no
/// longer matches the embedder and text. Rows with vectors but no hash were
/// supplied by the importer and are left alone unless `force` is set.
pub struct EmbeddingPipeline<'a> {
    embedder: &'a dyn Embedder,
    db: &'a mut Connection,
    force: bool,
}

impl<'a> EmbeddingPipeline<'a> {
    pub fn new(embedder: &'a dyn Embedder, db: &'a mut Connection) -> Self {
        Self {
            embedder,
            db,
            force: false,
        }
    }

    #[must_use]
    pub const fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Embed every stale row, one transaction per batch.
    ///
    /// # Errors
    ///
    /// Fails on SQL errors or when the embedder fails or returns a malformed
    /// vector. Batches committed before the failure are kept.
    pub fn run(self) -> Result<SyncStats> {
        let states = embedding_states(self.db)?;
        let mut stats = SyncStats {
            scanned: states.len(),
            ..SyncStats::default()
        };

        let pending: Vec<(EmbeddingState, String)> = states
            .into_iter()
            .filter_map(|state| {
                let hash = embedding_content_hash(self.embedder.id(), &state.name, &state.city);
                if self.force || needs_embedding(&state, &hash) {
                    Some((state, hash))
                } else {
                    None
                }
            })
            .collect();
        stats.skipped = stats.scanned - pending.len();

        for batch in pending.chunks(BATCH_SIZE) {
            let names: Vec<String> = batch
                .iter()
                .map(|(state, _)| normalize_query(&state.name))
                .collect();
            let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let city_refs: Vec<&str> = batch.iter().map(|(state, _)| state.city.as_str()).collect();

            let name_vectors = self
                .embedder
                .embed_batch(&name_refs)
                .context("batch embedding of airport names failed")?;
            let city_vectors = self
                .embedder
                .embed_batch(&city_refs)
                .context("batch embedding of airport cities failed")?;
            if name_vectors.len() != batch.len() || city_vectors.len() != batch.len() {
                bail!(
                    "embedding batch length mismatch: expected {}, got {} names / {} cities",
                    batch.len(),
                    name_vectors.len(),
                    city_vectors.len()
                );
            }

            let tx = self.db.transaction().context("begin embedding batch")?;
            for (((state, hash), name_vec), city_vec) in
                batch.iter().zip(&name_vectors).zip(&city_vectors)
            {
                check_output(name_vec, self.embedder.dimension())
                    .with_context(|| format!("name embedding for airport {}", state.airport_id))?;
                check_output(city_vec, self.embedder.dimension())
                    .with_context(|| format!("city embedding for airport {}", state.airport_id))?;
                store_embeddings(&tx, state.airport_id, name_vec, city_vec, hash)?;
            }
            tx.commit().context("commit embedding batch")?;

            stats.embedded += batch.len();
            debug!(embedded = stats.embedded, total = pending.len(), "embedding batch stored");
        }

        if stats.embedded > 0 {
            set_embedder_id(self.db, self.embedder.id())?;
        }
        info!(
            scanned = stats.scanned,
            embedded = stats.embedded,
            skipped = stats.skipped,
            embedder = self.embedder.id(),
            "catalog embeddings synced"
        );
        Ok(stats)
    }
}

/// Convenience wrapper around [`EmbeddingPipeline`].
///
/// # Errors
///
/// See [`EmbeddingPipeline::run`].
pub fn sync_catalog_embeddings(
    db: &mut Connection,
    embedder: &dyn Embedder,
    force: bool,
) -> Result<SyncStats> {
    EmbeddingPipeline::new(embedder, db).force(force).run()
}

/// SHA-256 over the embedder id and the exact texts that get embedded.
#[must_use]
pub fn embedding_content_hash(embedder_id: &str, name: &str, city: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(embedder_id.as_bytes());
    hasher.update([0]);
    hasher.update(normalize_query(name).as_bytes());
    hasher.update([0]);
    hasher.update(city.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn needs_embedding(state: &EmbeddingState, hash: &str) -> bool {
    if !state.has_name_embedding || !state.has_city_embedding {
        return true;
    }
    state
        .embedding_hash
        .as_deref()
        .is_some_and(|stored| stored != hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::HashEmbedder;
    use crate::semantic::embedder::EmbedError;
    use runway_core::db::catalog::{
        catalog_stats, embedder_id, load_airport_with_embeddings, upsert_airport,
    };
    use runway_core::db::open_catalog_in_memory;
    use runway_core::{Airport, EMBEDDING_DIM};

    fn seeded() -> Connection {
        let conn = open_catalog_in_memory().expect("catalog");
        for airport in [
            Airport::new(1, "Goroka Airport", "Goroka", "Papua New Guinea", "Pacific/Port_Moresby")
                .with_codes(Some("GKA"), Some("AYGA")),
            Airport::new(2, "Madang Airport", "Madang", "Papua New Guinea", "Pacific/Port_Moresby")
                .with_codes(Some("MAG"), Some("AYMD")),
        ] {
            upsert_airport(&conn, &airport).expect("seed");
        }
        conn
    }

    struct Broken;

    impl Embedder for Broken {
        fn id(&self) -> &str {
            "broken"
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Err(EmbedError::Inference("boom".into()))
        }
    }

    #[test]
    fn hash_depends_on_embedder_and_text() {
        let a = embedding_content_hash("hash", "Goroka Airport", "Goroka");
        assert_eq!(a, embedding_content_hash("hash", "Goroka", "Goroka"));
        assert_ne!(a, embedding_content_hash("onnx", "Goroka Airport", "Goroka"));
        assert_ne!(a, embedding_content_hash("hash", "Goroka Airport", "Lae"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn first_pass_embeds_second_pass_skips() {
        let mut conn = seeded();
        let embedder = HashEmbedder::default();

        let first = sync_catalog_embeddings(&mut conn, &embedder, false).expect("sync");
        assert_eq!(first.embedded, 2);
        assert_eq!(first.skipped, 0);

        let second = sync_catalog_embeddings(&mut conn, &embedder, false).expect("sync");
        assert_eq!(second.embedded, 0);
        assert_eq!(second.skipped, 2);

        let stats = catalog_stats(&conn).expect("stats");
        assert_eq!(stats.with_name_embedding, 2);
        assert_eq!(
            embedder_id(&conn).expect("id").as_deref(),
            Some(HashEmbedder::ID)
        );
    }

    #[test]
    fn stored_name_vector_excludes_airport_suffix() {
        let mut conn = seeded();
        let embedder = HashEmbedder::default();
        sync_catalog_embeddings(&mut conn, &embedder, false).expect("sync");

        let airport = load_airport_with_embeddings(&conn, 1)
            .expect("load")
            .expect("row");
        assert_eq!(
            airport.name_embedding.expect("name vector"),
            embedder.embed_text("Goroka")
        );
    }

    #[test]
    fn renamed_row_is_re_embedded() {
        let mut conn = seeded();
        let embedder = HashEmbedder::default();
        sync_catalog_embeddings(&mut conn, &embedder, false).expect("sync");

        let renamed = Airport::new(2, "Madang Intl Airport", "Madang", "Papua New Guinea", "Pacific/Port_Moresby");
        upsert_airport(&conn, &renamed).expect("rename");

        let stats = sync_catalog_embeddings(&mut conn, &embedder, false).expect("sync");
        assert_eq!(stats.embedded, 1);
    }

    #[test]
    fn imported_vectors_survive_unless_forced() {
        let mut conn = seeded();
        let supplied = Airport::new(3, "Lae Airport", "Lae", "Papua New Guinea", "Pacific/Port_Moresby")
            .with_embeddings(vec![0.5; EMBEDDING_DIM], vec![0.25; EMBEDDING_DIM]);
        upsert_airport(&conn, &supplied).expect("supplied");
        let embedder = HashEmbedder::default();

        let stats = sync_catalog_embeddings(&mut conn, &embedder, false).expect("sync");
        assert_eq!((stats.embedded, stats.skipped), (2, 1));

        let forced = sync_catalog_embeddings(&mut conn, &embedder, true).expect("sync");
        assert_eq!(forced.embedded, 3);
        let lae = load_airport_with_embeddings(&conn, 3).expect("load").expect("row");
        assert_eq!(lae.city_embedding.expect("city"), embedder.embed_text("Lae"));
    }

    #[test]
    fn embedder_failure_aborts_without_writes() {
        let mut conn = seeded();
        let err = sync_catalog_embeddings(&mut conn, &Broken, false).expect_err("boom");
        assert!(format!("{err:#}").contains("boom"));
        assert_eq!(catalog_stats(&conn).expect("stats").with_name_embedding, 0);
    }
}
