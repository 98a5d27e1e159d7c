//! Repository: package archive discovery across file, http and ftp sources.
//!
//! A repository is one source string `"<url> [component ...]"`. Candidate
//! archive URLs are enumerated once per instance (memoized) and package
//! lookups resolve by archive basename.

use std::cell::OnceCell;
use std::fs;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use log::debug;
use regex::Regex;

use crate::PACKAGE_EXT;
use crate::archive::PackageArchive;
use crate::config::Config;
use crate::http::HttpClient;

static AHREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<a href="([^"]*)">"#).expect("static pattern compiles"));

pub struct Repository<'a> {
    config: &'a Config,
    http: &'a HttpClient,
    url: String,
    components: Vec<String>,
    loaded_urls: OnceCell<Vec<String>>,
}

impl<'a> Repository<'a> {
    /// Parse a source string into a base url plus sub-path components to
    /// search (default: the base itself).
    pub fn new(config: &'a Config, http: &'a HttpClient, source: &str) -> Self {
        let mut fields = source.split_whitespace();
        let url = fields.next().unwrap_or("").to_string();
        let components: Vec<String> = fields.map(str::to_string).collect();
        let components = if components.is_empty() {
            vec![String::new()]
        } else {
            components
        };
        Self {
            config,
            http,
            url,
            components,
            loaded_urls: OnceCell::new(),
        }
    }

    /// All candidate archive URLs, loaded once.
    pub fn list(&self) -> &[String] {
        self.load_urls()
    }

    /// Enumerate candidate archive URLs for every configured component;
    /// memoized for the life of the instance.
    pub fn load_urls(&self) -> &[String] {
        self.loaded_urls.get_or_init(|| {
            let mut urls = Vec::new();
            for component in &self.components {
                let base = join_url(&self.url, component);
                let loaded = if self.url.starts_with("http://") || self.url.starts_with("https://")
                {
                    self.load_http_urls(&base)
                } else if self.url.starts_with("ftp://") {
                    self.load_ftp_urls(&base)
                } else {
                    self.load_file_urls(&base)
                };
                urls.extend(loaded);
            }
            urls
        })
    }

    /// URL of the archive named `<package_name>.ssm`, if any source lists
    /// one.
    pub fn find(&self, package_name: &str) -> Option<&str> {
        let filename = format!("{package_name}.{PACKAGE_EXT}");
        self.list()
            .iter()
            .find(|url| basename(url) == filename)
            .map(String::as_str)
    }

    /// Resolve, download and open the archive for `package_name`. Any
    /// failure (not found, download error, open error) yields `None` so a
    /// caller can fall through to the next configured source.
    #[tracing::instrument(skip(self))]
    pub fn get(&self, package_name: &str) -> Option<PackageArchive> {
        let url = self.find(package_name)?.to_string();
        match self.open_archive(&url) {
            Ok(archive) => Some(archive),
            Err(err) => {
                debug!("could not fetch archive ({url}): {err:#}");
                None
            }
        }
    }

    fn open_archive(&self, url: &str) -> Result<PackageArchive> {
        if url.starts_with("http://") || url.starts_with("https://") {
            // Download into an anonymous temp file: already unlinked, the
            // open handle keeps the data until the archive is dropped.
            let mut file = self.http.download(url, || {
                tempfile::tempfile().context("failed to create temporary file")
            })?;
            file.seek(SeekFrom::Start(0))
                .context("failed to rewind downloaded archive")?;
            PackageArchive::open(file)
        } else {
            PackageArchive::open_path(&file_path(url))
        }
    }

    /// Links from a web directory listing, kept when they end in the
    /// archive extension and resolved against the listing URL.
    fn load_http_urls(&self, base_url: &str) -> Vec<String> {
        self.config
            .print_verbose(&format!("loading urls over http ({base_url})"));
        let body = match self.http.fetch_text(base_url) {
            Ok(body) => body,
            Err(err) => {
                debug!("http listing failed ({base_url}): {err:#}");
                return Vec::new();
            }
        };
        let suffix = format!(".{PACKAGE_EXT}");
        AHREF_RE
            .captures_iter(&body)
            .map(|caps| caps[1].to_string())
            .filter(|href| href.ends_with(&suffix))
            .map(|href| {
                if href.starts_with("http://") || href.starts_with("https://") {
                    href
                } else {
                    join_url(base_url, href.trim_start_matches('/'))
                }
            })
            .collect()
    }

    fn load_ftp_urls(&self, base_url: &str) -> Vec<String> {
        // Extension point; ftp discovery yields nothing for now.
        self.config
            .print_verbose(&format!("loading urls over ftp ({base_url})"));
        Vec::new()
    }

    /// Non-recursive filesystem directory listing.
    fn load_file_urls(&self, base_url: &str) -> Vec<String> {
        self.config
            .print_verbose(&format!("loading urls from filesystem ({base_url})"));
        let dir = file_path(base_url);
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut urls: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path().display().to_string())
            .collect();
        urls.sort();
        urls
    }
}

fn join_url(base: &str, component: &str) -> String {
    if component.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), component)
    }
}

fn file_path(url: &str) -> PathBuf {
    Path::new(url.strip_prefix("file://").unwrap_or(url)).to_path_buf()
}

fn basename(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}
