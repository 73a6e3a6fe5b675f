use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::fetch::{
  FetchSettings,
  InitialLoadMode
};
use crate::store::SelectionFallback;

pub const DEFAULT_API_URL: &str =
  "http://localhost:8080/task";

const CONFIG_ENV_VAR: &str =
  "FOCUSBOARDRC";
const CONFIG_FILE_NAME: &str =
  ".focusboardrc";

#[derive(Debug, Clone)]
pub struct Config {
  map:              HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (key, value) in [
      ("api.url", DEFAULT_API_URL),
      ("api.timeout", "10"),
      ("fetch.initial", "fallback"),
      ("fetch.retry", "1"),
      ("fetch.offline_fallback", "on"),
      ("fetch.stale", "60"),
      ("fetch.offline", "off"),
      ("pomodoro.minutes", "25"),
      ("selection.fallback", "first"),
      ("color", "on")
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }

    Config {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc =
      resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading config");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no config file found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn set(
    &mut self,
    key: &str,
    value: impl Into<String>
  ) {
    self
      .map
      .insert(key.to_string(), value.into());
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<bool> {
    let raw = self.require(key)?;
    parse_bool(&raw).ok_or_else(|| {
      anyhow!(
        "invalid boolean for {key}: \
         {raw}"
      )
    })
  }

  pub fn get_parsed<T>(
    &self,
    key: &str
  ) -> anyhow::Result<T>
  where
    T: FromStr,
    T::Err: std::fmt::Display
  {
    let raw = self.require(key)?;
    raw.trim().parse::<T>().map_err(
      |err| {
        anyhow!(
          "invalid value for {key}: \
           {raw} ({err})"
        )
      }
    )
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  pub fn api_url(
    &self
  ) -> anyhow::Result<String> {
    let url = self.require("api.url")?;
    let url =
      url.trim().trim_end_matches('/');
    if !(url.starts_with("http://")
      || url.starts_with("https://"))
    {
      return Err(anyhow!(
        "api.url must be an http(s) \
         URL, got: {url}"
      ));
    }
    Ok(url.to_string())
  }

  pub fn pomodoro_secs(
    &self
  ) -> anyhow::Result<u32> {
    let minutes: u32 =
      self.get_parsed("pomodoro.minutes")?;
    if minutes == 0 {
      return Err(anyhow!(
        "pomodoro.minutes must be at \
         least 1"
      ));
    }
    Ok(minutes * 60)
  }

  pub fn selection_fallback(
    &self
  ) -> anyhow::Result<SelectionFallback>
  {
    let raw =
      self.require("selection.fallback")?;
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "first" => {
        Ok(SelectionFallback::FirstRow)
      }
      | "clear" => {
        Ok(SelectionFallback::Clear)
      }
      | other => {
        Err(anyhow!(
          "invalid selection.fallback: \
           {other} (expected first or \
           clear)"
        ))
      }
    }
  }

  #[tracing::instrument(skip(self))]
  pub fn fetch_settings(
    &self
  ) -> anyhow::Result<FetchSettings> {
    let initial = match self
      .require("fetch.initial")?
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "fallback" | "demo" => {
        InitialLoadMode::FallbackToDemo
      }
      | "error" => {
        InitialLoadMode::SurfaceError
      }
      | other => {
        return Err(anyhow!(
          "invalid fetch.initial: \
           {other} (expected fallback \
           or error)"
        ));
      }
    };

    let settings = FetchSettings {
      base_url: self.api_url()?,
      timeout: Duration::from_secs(
        self.get_parsed("api.timeout")?
      ),
      initial,
      retry: self
        .get_parsed("fetch.retry")?,
      offline_fallback: self
        .get_bool(
          "fetch.offline_fallback"
        )?,
      offline: self
        .get_bool("fetch.offline")?,
      stale_after: Duration::from_secs(
        self.get_parsed("fetch.stale")?
      )
    };
    debug!(?settings, "resolved fetch settings");
    Ok(settings)
  }

  fn require(
    &self,
    key: &str
  ) -> anyhow::Result<String> {
    self.get(key).ok_or_else(|| {
      anyhow!("missing config key: {key}")
    })
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    self.load_file_nested(
      path,
      &mut Vec::new()
    )
  }

  /// `including` holds the canonical
  /// paths of the files currently being
  /// read, outermost first.
  fn load_file_nested(
    &mut self,
    path: &Path,
    including: &mut Vec<PathBuf>
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    let canonical =
      fs::canonicalize(&path)
        .unwrap_or_else(|_| path.clone());
    if including.contains(&canonical) {
      return Err(anyhow!(
        "include cycle at {}",
        path.display()
      ));
    }
    including.push(canonical);

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self.load_file_nested(
            &include_path,
            including
          )?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    including.pop();
    Ok(())
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(env_path) =
    std::env::var(CONFIG_ENV_VAR)
  {
    if env_path == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      env_path
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping config file"
    );
    return Ok(None);
  };
  let candidate =
    home.join(CONFIG_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

pub(crate) fn parse_bool(
  s: &str
) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}
