use std::sync::Arc;

use crate::config::LinkerConfig;
use crate::pipeline::{CancelToken, Linker, RunOptions};
use crate::retry::RetryPolicy;
use crate::semantic::EmbeddingClient;
use crate::vault::{FsVault, VaultStore};

use super::BagOfWords;

/// Linker against a vault on disk: CRLF notes keep their line endings,
/// hidden folders stay untouched.
#[test]
fn test_linker_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    std::fs::create_dir_all(root.join("fruit")).unwrap();
    std::fs::create_dir_all(root.join(".obsidian")).unwrap();
    std::fs::write(root.join("fruit/apples.md"), "Apple fruit, sweet.\r\n").unwrap();
    std::fs::write(root.join("citrus.md"), "Citrus fruit, sweet.\n").unwrap();
    std::fs::write(root.join(".obsidian/cache.md"), "apple fruit sweet\n").unwrap();

    let vault: Arc<dyn VaultStore> = Arc::new(FsVault::open(root, &[]).unwrap());
    let embedder = EmbeddingClient::new(Arc::new(BagOfWords::new()), RetryPolicy::no_retry());
    let config = LinkerConfig {
        min_score: 0.1,
        ..LinkerConfig::default()
    };

    let summary = Linker::new(vault, embedder, config, 1)
        .run(&RunOptions::default(), &CancelToken::new())
        .unwrap();

    assert_eq!(summary.notes_found, 2);
    assert_eq!(
        std::fs::read_to_string(root.join("fruit/apples.md")).unwrap(),
        "Apple fruit, sweet.\r\n\r\n<!-- vaultlink:related-notes:start -->\r\n### Related Notes\r\n- [[citrus]]\r\n<!-- vaultlink:related-notes:end -->\r\n"
    );
    assert_eq!(
        std::fs::read_to_string(root.join("citrus.md")).unwrap(),
        "Citrus fruit, sweet.\n\n<!-- vaultlink:related-notes:start -->\n### Related Notes\n- [[fruit/apples]]\n<!-- vaultlink:related-notes:end -->\n"
    );
    assert_eq!(
        std::fs::read_to_string(root.join(".obsidian/cache.md")).unwrap(),
        "apple fruit sweet\n"
    );
}
