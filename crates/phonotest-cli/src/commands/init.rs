//! The `phonotest init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    if Path::new("phonotest.toml").exists() {
        println!("phonotest.toml already exists, skipping.");
    } else {
        std::fs::write("phonotest.toml", SAMPLE_CONFIG)?;
        println!("Created phonotest.toml");
    }

    std::fs::create_dir_all("trial-sets")?;
    for (name, content) in SAMPLE_TRIAL_SETS {
        let path = Path::new("trial-sets").join(name);
        if path.exists() {
            println!("trial-sets/{name} already exists, skipping.");
        } else {
            std::fs::write(&path, content)?;
            println!("Created trial-sets/{name}");
        }
    }

    println!("\nNext steps:");
    println!("  1. Run: phonotest hash-secret <password>");
    println!("  2. Put the digest in phonotest.toml as download_secret_sha256");
    println!("  3. Run: phonotest validate --trial-sets trial-sets");
    println!("  4. Run: phonotest start --subject <id> --phase wpre");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# phonotest configuration

trial_sets_dir = "trial-sets"

# reject-duplicate | allow-duplicate | overwrite-by-key
duplicate_policy = "allow-duplicate"

# SHA-256 of the results download password (see `phonotest hash-secret`).
# May also be set with PHONOTEST_SECRET_SHA256.
# download_secret_sha256 = "${PHONOTEST_DOWNLOAD_DIGEST}"

[store]
type = "jsonl"
path = "phonotest-data/responses.jsonl"
"#;

const SAMPLE_TRIAL_SETS: [(&str, &str); 4] = [
    (
        "word-pre.toml",
        include_str!("../../../../trial-sets/word-pre.toml"),
    ),
    (
        "sentence-pre.toml",
        include_str!("../../../../trial-sets/sentence-pre.toml"),
    ),
    (
        "word-post.toml",
        include_str!("../../../../trial-sets/word-post.toml"),
    ),
    (
        "sentence-post.toml",
        include_str!("../../../../trial-sets/sentence-post.toml"),
    ),
];
