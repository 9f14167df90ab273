//! Cookie-backed mirror of the session.
//!
//! Session tokens are kept in cookies as well as key-value storage so that a
//! server-rendered path (which only sees the `Cookie` header) observes the same
//! session as the client. Cookies are written with `Path=/`, `SameSite=Lax` and a
//! 30-day lifetime.

use cookie::{Cookie, CookieJar, SameSite};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::storage::{StorageError, StorageResult};

/// Lifetime of session cookies
pub const COOKIE_MAX_AGE_DAYS: i64 = 30;

#[derive(Debug)]
pub struct CookieStore {
    jar: Mutex<CookieJar>,
    path: Option<PathBuf>,
}

impl Default for CookieStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieStore {
    /// In-memory cookie store
    pub fn new() -> Self {
        Self {
            jar: Mutex::new(CookieJar::new()),
            path: None,
        }
    }

    /// Cookie store persisted to `path`, one `Set-Cookie` line per cookie.
    /// Lines that fail to parse and cookies that have already expired are dropped.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let mut jar = CookieJar::new();

        match fs::read_to_string(&path) {
            Ok(contents) => {
                let now = OffsetDateTime::now_utc();
                for line in contents.lines().filter(|l| !l.trim().is_empty()) {
                    match Cookie::parse(line.trim().to_string()) {
                        Ok(cookie) if !is_expired(&cookie, now) => jar.add(cookie),
                        Ok(cookie) => debug!("Dropping expired cookie {}", cookie.name()),
                        Err(e) => debug!("Skipping unparseable cookie line: {}", e),
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(StorageError::Io { path, source }),
        }

        Ok(Self {
            jar: Mutex::new(jar),
            path: Some(path),
        })
    }

    /// Cookie store persisted to `cookies.txt` inside `dir`
    pub fn open_in_dir(dir: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open(dir.as_ref().join("cookies.txt"))
    }

    pub fn get(&self, name: &str) -> StorageResult<Option<String>> {
        let jar = self.jar.lock().map_err(|_| StorageError::Unavailable)?;
        let now = OffsetDateTime::now_utc();
        Ok(jar
            .get(name)
            .filter(|c| !is_expired(c, now))
            .map(|c| c.value().to_string()))
    }

    pub fn set(&self, name: &str, value: &str) -> StorageResult<()> {
        self.set_many(&[(name, value)])
    }

    pub fn remove(&self, name: &str) -> StorageResult<()> {
        self.remove_many(&[name])
    }

    /// Set several cookies with a single write to disk
    pub fn set_many(&self, pairs: &[(&str, &str)]) -> StorageResult<()> {
        let mut jar = self.jar.lock().map_err(|_| StorageError::Unavailable)?;
        for (name, value) in pairs {
            jar.add(session_cookie(name.to_string(), value.to_string()));
        }
        self.persist(&jar)
    }

    /// Remove several cookies with a single write to disk
    pub fn remove_many(&self, names: &[&str]) -> StorageResult<()> {
        let mut jar = self.jar.lock().map_err(|_| StorageError::Unavailable)?;
        for name in names {
            jar.remove(Cookie::from(name.to_string()));
        }
        self.persist(&jar)
    }

    /// Value of the `Cookie` request header carrying every live cookie
    pub fn cookie_header(&self) -> StorageResult<Option<String>> {
        let jar = self.jar.lock().map_err(|_| StorageError::Unavailable)?;
        let now = OffsetDateTime::now_utc();
        let mut pairs: Vec<String> = jar
            .iter()
            .filter(|c| !is_expired(c, now))
            .map(|c| c.stripped().to_string())
            .collect();
        pairs.sort();

        if pairs.is_empty() {
            Ok(None)
        } else {
            Ok(Some(pairs.join("; ")))
        }
    }

    /// Full `Set-Cookie` header values for every stored cookie
    pub fn set_cookie_headers(&self) -> StorageResult<Vec<String>> {
        let jar = self.jar.lock().map_err(|_| StorageError::Unavailable)?;
        let mut headers: Vec<String> = jar.iter().map(|c| c.to_string()).collect();
        headers.sort();
        Ok(headers)
    }

    fn persist(&self, jar: &CookieJar) -> StorageResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
        }

        let mut lines: Vec<String> = jar.iter().map(|c| c.to_string()).collect();
        lines.sort();
        let mut contents = lines.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }

        let tmp_path = path.with_extension("txt.tmp");
        fs::write(&tmp_path, contents)
            .and_then(|_| fs::rename(&tmp_path, path))
            .map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })
    }
}

fn session_cookie(name: String, value: String) -> Cookie<'static> {
    let max_age = Duration::days(COOKIE_MAX_AGE_DAYS);
    Cookie::build((name, value))
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .expires(OffsetDateTime::now_utc() + max_age)
        .build()
}

fn is_expired(cookie: &Cookie<'_>, now: OffsetDateTime) -> bool {
    cookie.expires_datetime().is_some_and(|at| at <= now)
}
