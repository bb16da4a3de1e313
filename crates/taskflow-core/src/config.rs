use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use reqwest::Url;
use tracing::{
  debug,
  info,
  trace,
  warn
};

pub const DEFAULT_BASE_URL: &str =
  "http://localhost:5000/api";

const DEFAULT_TIMEOUT_SECS: &str = "30";

/// Environment variables consulted after
/// the rc file, keyed to the setting they
/// replace.
const ENV_OVERRIDES: [(&str, &str); 2] = [
  ("TASKFLOW_SERVICE_URL", "service.url"),
  (
    "TASKFLOW_ASSISTANT_URL",
    "assistant.url"
  )
];

#[derive(Debug, Clone)]
pub struct Config {
  map:              HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
  pub task_url:      String,
  pub assistant_url: String,
  pub timeout:       Duration
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    map.insert(
      "service.url".to_string(),
      DEFAULT_BASE_URL.to_string()
    );
    map.insert(
      "assistant.url".to_string(),
      DEFAULT_BASE_URL.to_string()
    );
    map.insert(
      "request.timeout".to_string(),
      DEFAULT_TIMEOUT_SECS.to_string()
    );
    map.insert(
      "color".to_string(),
      "on".to_string()
    );

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    Self::load_with(
      config_override,
      |key| std::env::var(key).ok()
    )
  }

  fn load_with<F>(
    config_override: Option<&Path>,
    lookup: F
  ) -> anyhow::Result<Self>
  where
    F: Fn(&str) -> Option<String>
  {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(
      config_override,
      &lookup
    )?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading taskflowrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no taskflowrc found; using \
         defaults"
      );
    }

    cfg.apply_env(lookup);
    Ok(cfg)
  }

  pub fn apply_env<F>(
    &mut self,
    lookup: F
  ) where
    F: Fn(&str) -> Option<String>
  {
    for (var, key) in ENV_OVERRIDES {
      if let Some(value) = lookup(var)
        && !value.trim().is_empty()
      {
        debug!(var, key, "applying environment override");
        self.map.insert(
          key.to_string(),
          value.trim().to_string()
        );
      }
    }
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

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  /// Typed view of the two remote
  /// endpoints and the request timeout.
  pub fn service_settings(
    &self
  ) -> anyhow::Result<ServiceSettings> {
    let task_url = normalize_base_url(
      "service.url",
      &self
        .get("service.url")
        .unwrap_or_else(|| {
          DEFAULT_BASE_URL.to_string()
        })
    )?;
    let assistant_url =
      normalize_base_url(
        "assistant.url",
        &self
          .get("assistant.url")
          .unwrap_or_else(|| {
            task_url.clone()
          })
      )?;

    let raw_timeout = self
      .get("request.timeout")
      .unwrap_or_else(|| {
        DEFAULT_TIMEOUT_SECS.to_string()
      });
    let secs = raw_timeout
      .trim()
      .parse::<u64>()
      .with_context(|| {
        format!(
          "invalid request.timeout: \
           {raw_timeout}"
        )
      })?;
    if secs == 0 {
      return Err(anyhow!(
        "request.timeout must be at \
         least one second"
      ));
    }

    Ok(ServiceSettings {
      task_url,
      assistant_url,
      timeout: Duration::from_secs(secs)
    })
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
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
      let line = match raw_line
        .split_once('#')
      {
        | Some((before, _)) => {
          before.trim()
        }
        | None => raw_line.trim()
      };

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
        if self
          .loaded_files
          .contains(&include_path)
        {
          warn!(include = %include_path.display(), "include cycle detected; skipping");
          continue;
        }

        if include_path.exists() {
          self
            .load_file(&include_path)?;
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

    Ok(())
  }
}

fn resolve_rc_path<F>(
  override_path: Option<&Path>,
  lookup: &F
) -> anyhow::Result<Option<PathBuf>>
where
  F: Fn(&str) -> Option<String>
{
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Some(rc_env) =
    lookup("TASKFLOWRC")
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping \
       ~/.taskflowrc"
    );
    return Ok(None);
  };
  let candidate =
    home.join(".taskflowrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn normalize_base_url(
  key: &str,
  raw: &str
) -> anyhow::Result<String> {
  let trimmed =
    raw.trim().trim_end_matches('/');
  let url = Url::parse(trimmed)
    .with_context(|| {
      format!(
        "invalid {key}: {raw}"
      )
    })?;
  match url.scheme() {
    | "http" | "https" => {
      Ok(trimmed.to_string())
    }
    | other => Err(anyhow!(
      "{key} must use http or https, \
       got {other}"
    ))
  }
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

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
