use tokio::sync::OnceCell;

use crate::fetcher::Fetcher;
use crate::index::{self, IndexSource};
use crate::matcher::Corpus;
use crate::render::{self, RenderPlan};

/// One search dialog's lifetime: the index is loaded on first activation and
/// then only read.
pub struct SearchSession {
    source: IndexSource,
    fetcher: Fetcher,
    corpus: OnceCell<Corpus>,
}

impl SearchSession {
    pub fn new(source: IndexSource, fetcher: Fetcher) -> Self {
        Self {
            source,
            fetcher,
            corpus: OnceCell::new(),
        }
    }

    /// Loads the index on the first call; later calls return the same corpus.
    pub async fn activate(&self) -> &Corpus {
        self.corpus
            .get_or_init(|| async {
                Corpus::new(index::load_or_empty(&self.source, &self.fetcher).await)
            })
            .await
    }

    pub fn is_loaded(&self) -> bool {
        self.corpus.initialized()
    }

    /// Before activation the session searches zero documents.
    pub fn handle_query_changed(&self, query: &str) -> RenderPlan {
        match self.corpus.get() {
            Some(corpus) => render::handle_query_changed(corpus, query),
            None => render::handle_query_changed(&Corpus::new(Vec::new()), query),
        }
    }

    pub fn close(&self) -> RenderPlan {
        render::reset_plan()
    }
}
