use std::collections::BTreeMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono_tz::Tz;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::grid::WeekStart;

pub const RC_ENV_VAR: &str = "FUTSALRC";

const DATA_LOCATION: &str = "data.location";
const TIMEZONE: &str = "timezone";
const WEEK_START: &str = "calendar.week_start";
const COLOR: &str = "color";

/// Desk configuration from the rc file and
/// command-line overrides. Known keys are
/// checked as they arrive, so a bad value
/// fails at startup rather than deep in a
/// command.
#[derive(Debug, Clone)]
pub struct Config {
  values:           BTreeMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let values = [
      (DATA_LOCATION, "~/.futsal"),
      (WEEK_START, "sunday"),
      (COLOR, "on")
    ]
    .into_iter()
    .map(|(k, v)| {
      (k.to_string(), v.to_string())
    })
    .collect();
    Self {
      values,
      loaded_files: vec![]
    }
  }
}

/// One meaningful rc line.
#[derive(Debug, PartialEq, Eq)]
enum RcLine<'a> {
  Include(&'a str),
  Entry(&'a str, &'a str)
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    match locate_rc(rc_override) {
      | Some(path) => {
        info!(futsalrc = %path.display(), "loading futsalrc");
        cfg.read_rc(&path)?;
      }
      | None => {
        debug!("no futsalrc; using defaults")
      }
    }

    Ok(cfg)
  }

  /// Applies `--rc key=value` and
  /// `rc.key=value` overrides; the `rc.`
  /// prefix is optional.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      let key = key
        .strip_prefix("rc.")
        .unwrap_or(&key);
      debug!(key, value = %value, "applying override");
      self
        .set(key, &value)
        .context("invalid --rc override")?;
    }
    Ok(())
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<&str> {
    self.values.get(key).map(String::as_str)
  }

  /// All keys, sorted.
  pub fn entries(
    &self
  ) -> impl Iterator<Item = (&str, &str)>
  {
    self
      .values
      .iter()
      .map(|(k, v)| (k.as_str(), v.as_str()))
  }

  #[must_use]
  pub fn week_start(&self) -> WeekStart {
    self
      .get(WEEK_START)
      .and_then(WeekStart::parse)
      .unwrap_or_default()
  }

  /// The configured facility zone name,
  /// if any.
  #[must_use]
  pub fn timezone(&self) -> Option<&str> {
    self.get(TIMEZONE)
  }

  #[must_use]
  pub fn color(&self) -> bool {
    self
      .get(COLOR)
      .and_then(parse_switch)
      .unwrap_or(true)
  }

  fn set(
    &mut self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    check_value(key, value)?;
    trace!(key, value, "config key set");
    self
      .values
      .insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn read_rc(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    if self.loaded_files.contains(&path) {
      warn!(file = %path.display(), "rc file already loaded; skipping");
      return Ok(());
    }
    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    self.loaded_files.push(path.clone());

    for (idx, raw) in text.lines().enumerate()
    {
      let location = || {
        format!(
          "{}:{}",
          path.display(),
          idx + 1
        )
      };
      match parse_rc_line(raw)
        .with_context(location)?
      {
        | None => {}
        | Some(RcLine::Include(target)) => {
          let target =
            include_target(&path, target);
          if target.exists() {
            self.read_rc(&target)?;
          } else {
            warn!(include = %target.display(), "include file does not exist; skipping");
          }
        }
        | Some(RcLine::Entry(key, value)) => {
          self
            .set(key, value)
            .with_context(location)?;
        }
      }
    }

    Ok(())
  }
}

/// `on/off`, `yes/no`, `true/false`,
/// `1/0`.
#[must_use]
pub fn parse_switch(
  raw: &str
) -> Option<bool> {
  match raw
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "on" | "yes" | "true" | "1" => {
      Some(true)
    }
    | "off" | "no" | "false" | "0" => {
      Some(false)
    }
    | _ => None
  }
}

fn check_value(
  key: &str,
  value: &str
) -> anyhow::Result<()> {
  let valid = match key {
    | DATA_LOCATION => {
      !value.trim().is_empty()
    }
    | TIMEZONE => {
      value.trim().parse::<Tz>().is_ok()
    }
    | WEEK_START => {
      WeekStart::parse(value).is_some()
    }
    | COLOR => parse_switch(value).is_some(),
    | other => {
      warn!(key = other, "unknown config key");
      true
    }
  };
  if valid {
    Ok(())
  } else {
    Err(anyhow!(
      "invalid value for {key}: {value:?}"
    ))
  }
}

fn parse_rc_line(
  raw: &str
) -> anyhow::Result<Option<RcLine<'_>>> {
  let line = raw
    .split_once('#')
    .map_or(raw, |(before, _)| before)
    .trim();
  if line.is_empty() {
    return Ok(None);
  }
  if let Some(target) =
    line.strip_prefix("include ")
  {
    let target = target.trim();
    if target.is_empty() {
      return Err(anyhow!(
        "include needs a path"
      ));
    }
    return Ok(Some(RcLine::Include(target)));
  }
  let (key, value) =
    line.split_once('=').ok_or_else(|| {
      anyhow!("expected key = value, got {raw:?}")
    })?;
  Ok(Some(RcLine::Entry(
    key.trim(),
    value.trim()
  )))
}

/// Relative includes resolve against the
/// including file's directory.
fn include_target(
  from: &Path,
  target: &str
) -> PathBuf {
  let target = expand_tilde(Path::new(target));
  if target.is_absolute() {
    return target;
  }
  from
    .parent()
    .unwrap_or_else(|| Path::new("."))
    .join(target)
}

/// `--futsalrc`, then `$FUTSALRC`
/// (`/dev/null` disables), then
/// `~/.futsalrc` if present.
fn locate_rc(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(path.to_path_buf());
  }
  if let Ok(from_env) =
    std::env::var(RC_ENV_VAR)
  {
    return (from_env != "/dev/null")
      .then(|| PathBuf::from(from_env));
  }
  let candidate =
    dirs::home_dir()?.join(".futsalrc");
  candidate.exists().then_some(candidate)
}

/// Data directory from `--data`, else
/// `data.location`; created on first use.
#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = match override_dir {
    | Some(path) => path.to_path_buf(),
    | None => {
      let location = cfg
        .get(DATA_LOCATION)
        .unwrap_or("~/.futsal");
      expand_tilde(Path::new(location))
    }
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir).with_context(
      || {
        format!(
          "failed to create {}",
          dir.display()
        )
      }
    )?;
  }

  Ok(dir)
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  if let Ok(rest) = path.strip_prefix("~")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}
