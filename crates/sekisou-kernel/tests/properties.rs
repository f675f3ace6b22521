//! End-to-end behavior of the store, searches and tiering.

use std::sync::Arc;

use sekisou_glob::{GlobError, MatchOptions, compile, is_match};
use sekisou_kernel::search::{FindOptions, GlobOptions, find, glob};
use sekisou_kernel::tier::{MemoryTier, PromotionPolicy, TierBackend, TierConfig, TieredFs};
use sekisou_kernel::vfs::{
    ErrorCode, FileType, MemoryFs, MkdirOptions, ReadDirOptions, RmOptions, Tier, VfsOps,
};

async fn tree(fs: &MemoryFs, files: &[(&str, usize)]) {
    for (path, size) in files {
        if let Some(parent) = sekisou_kernel::vfs::path::parent(path) {
            fs.mkdir(parent, MkdirOptions::recursive()).await.unwrap();
        }
        fs.write(path, &vec![b'x'; *size]).await.unwrap();
    }
}

// ============================================================================
// Patterns
// ============================================================================

#[test]
fn empty_pattern_never_compiles() {
    let options = MatchOptions::default();
    assert_eq!(compile("", options).unwrap_err(), GlobError::EmptyPattern);
    for path in ["", "a", "/", "src/main.rs"] {
        assert!(is_match("", path, options).is_err());
    }
}

#[test]
fn empty_path_never_matches() {
    let options = MatchOptions::default().dot(true);
    for pattern in ["*", "**", "**/*", "a", "!a", "{,a}", "[a]"] {
        assert!(!is_match(pattern, "", options).unwrap(), "{pattern}");
    }
    assert!(is_match("/", "/", options).unwrap());
}

#[test]
fn globstar_matches_final_segment_at_any_depth() {
    let options = MatchOptions::default();
    for path in ["x", "a/x", "a/b/x", "a/b/c/d/e/x"] {
        assert!(is_match("**/x", path, options).unwrap(), "{path}");
    }
    assert!(!is_match("**/x", "a/x/y", options).unwrap());
    assert!(!is_match("**/x", "a/.hidden/x", options).unwrap());
    assert!(is_match("**/x", "a/.hidden/x", options.dot(true)).unwrap());
}

#[test]
fn brace_scenario() {
    let options = MatchOptions::default();
    let p = compile("src/**/*.{ts,tsx}", options).unwrap();
    assert!(p.matches("src/components/Button.tsx"));
    assert!(p.matches("src/index.ts"));
    assert!(!p.matches("test/foo.ts"));
    assert!(!p.matches("src/index.js"));
}

// ============================================================================
// Store
// ============================================================================

#[tokio::test]
async fn write_read_round_trip() {
    let fs = MemoryFs::new();
    fs.mkdir("/data", MkdirOptions::default()).await.unwrap();

    let payloads: Vec<Vec<u8>> = vec![
        Vec::new(),
        b"hello".to_vec(),
        (0..=255u8).collect(),
        vec![0u8; 70_000],
    ];
    for (i, payload) in payloads.iter().enumerate() {
        let path = format!("/data/f{i}");
        fs.write(&path, payload).await.unwrap();
        assert_eq!(&fs.read(&path).await.unwrap(), payload);
        assert_eq!(fs.stat(&path).await.unwrap().size, payload.len() as u64);
    }

    let err = fs.write("/missing/f", b"x").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ENOENT);
}

#[tokio::test]
async fn recursive_rm_removes_descendants() {
    let fs = MemoryFs::new();
    tree(&fs, &[("/w/a/1.txt", 1), ("/w/a/b/2.txt", 2), ("/w/c/3.txt", 3)]).await;

    let before: Vec<String> = find(&fs, &FindOptions::new("/w"))
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.path)
        .collect();
    assert_eq!(before.len(), 7);

    fs.rm("/w", RmOptions { recursive: true, force: false }).await.unwrap();
    for path in before {
        assert_eq!(fs.stat(&path).await.unwrap_err().code(), ErrorCode::ENOENT, "{path}");
    }
    assert_eq!(fs.inode_count(), 1);
    assert_eq!(fs.blob_count(), 0);
}

#[tokio::test]
async fn mkdir_recursive_scenario() {
    let fs = MemoryFs::new();
    fs.mkdir("/a/b/c", MkdirOptions::recursive()).await.unwrap();

    let names = |entries: Vec<sekisou_kernel::vfs::DirEntry>| -> Vec<String> {
        entries.into_iter().map(|e| e.name).collect()
    };
    let a = fs.readdir("/a", ReadDirOptions::default()).await.unwrap();
    assert!(names(a).contains(&"b".to_string()));
    let b = fs.readdir("/a/b", ReadDirOptions::default()).await.unwrap();
    assert!(names(b).contains(&"c".to_string()));
}

#[tokio::test]
async fn symlink_scenario() {
    let fs = MemoryFs::new();
    fs.write("/README.md", b"# readme").await.unwrap();
    fs.symlink("README.md", "/link").await.unwrap();

    assert_eq!(fs.readlink("/link").await.unwrap(), "README.md");
    assert_eq!(fs.realpath("/link").await.unwrap(), "/README.md");
    assert_eq!(fs.read("/link").await.unwrap(), b"# readme");
    assert!(fs.lstat("/link").await.unwrap().is_symlink());
}

// ============================================================================
// Searches
// ============================================================================

#[tokio::test]
async fn find_depth_bounds() {
    let fs = MemoryFs::new();
    tree(&fs, &[("/p/a/b/c.txt", 1), ("/p/d.txt", 1)]).await;

    for start in ["/p", "/p/d.txt", "/p/a/b"] {
        let results = find(&fs, &FindOptions::new(start).maxdepth(0)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, start);
    }

    let inverted = FindOptions::new("/p").mindepth(3).maxdepth(1);
    assert!(find(&fs, &inverted).await.unwrap().is_empty());

    let missing = FindOptions::new("/nope");
    assert!(find(&fs, &missing).await.unwrap().is_empty());
}

async fn sizes_matching(fs: &MemoryFs, spec: &str) -> Vec<u64> {
    let options = FindOptions::new("/s").kind(FileType::File).size(spec).unwrap();
    let mut sizes: Vec<u64> = find(fs, &options).await.unwrap().iter().map(|r| r.size).collect();
    sizes.sort();
    sizes
}

#[tokio::test]
async fn find_size_filters() {
    let fs = MemoryFs::new();
    let sizes = [0usize, 102_399, 102_400, 1_048_576, 1_048_577];
    let files: Vec<(String, usize)> = sizes.iter().map(|s| (format!("/s/f{s}"), *s)).collect();
    let borrowed: Vec<(&str, usize)> = files.iter().map(|(p, s)| (p.as_str(), *s)).collect();
    tree(&fs, &borrowed).await;

    assert_eq!(sizes_matching(&fs, "+1M").await, vec![1_048_577]);
    assert_eq!(sizes_matching(&fs, "-100K").await, vec![0, 102_399]);
    assert!(FindOptions::new("/s").size("+lots").is_err());
}

#[tokio::test]
async fn glob_is_scoped_to_cwd() {
    let fs = MemoryFs::new();
    tree(
        &fs,
        &[
            ("/src/index.ts", 1),
            ("/src/lib/util.ts", 1),
            ("/src/lib/deep/more.ts", 1),
            ("/src/app.js", 1),
            ("/test/foo.ts", 1),
            ("/root.ts", 1),
        ],
    )
    .await;

    let relative = glob(&fs, &["**/*.ts"], &GlobOptions::default().cwd("/src")).await.unwrap();
    assert_eq!(relative, vec!["index.ts", "lib/deep/more.ts", "lib/util.ts"]);

    let absolute = glob(&fs, &["**/*.ts"], &GlobOptions::default().cwd("/src").absolute(true))
        .await
        .unwrap();
    assert!(absolute.iter().all(|p| p.starts_with("/src/")));
    assert_eq!(absolute.len(), 3);
}

// ============================================================================
// Tiering
// ============================================================================

#[tokio::test]
async fn warm_payload_is_not_promoted_while_too_big() {
    let store = Arc::new(MemoryFs::new());
    let warm = Arc::new(MemoryTier::new("warm"));
    let config = TierConfig::default()
        .with_hot_max_size(8)
        .with_warm_max_size(1024)
        .with_policy(PromotionPolicy::OnAccess);
    let tiered = TieredFs::new(store.clone(), config).with_warm(warm.clone());

    let payload = vec![7u8; 64];
    assert_eq!(tiered.write_file("/big.bin", &payload).await.unwrap(), Tier::Warm);
    assert_eq!(tiered.placement("/big.bin").unwrap().tier, Tier::Warm);
    assert!(warm.contains("/big.bin").await.unwrap());

    assert_eq!(tiered.read_file("/big.bin").await.unwrap(), payload);
    assert_eq!(tiered.placement("/big.bin").unwrap().tier, Tier::Warm);
    assert_eq!(store.blob_id("/big.bin").unwrap(), None);
    assert!(tiered.pending_migrations().is_empty());
}
