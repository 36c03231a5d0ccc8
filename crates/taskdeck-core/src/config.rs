use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

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

pub const RC_ENV_VAR: &str =
  "TASKDECKRC";

/// Settings from the rc file and
/// command-line overrides.
///
/// Recognised keys: `data.location`,
/// `color` and `confirm`. Unknown keys
/// are kept but never read.
#[derive(Debug, Clone)]
pub struct Config {
  map:     HashMap<String, String>,
  sources: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let map = [
      ("color", "on"),
      ("confirm", "on")
    ]
    .into_iter()
    .map(|(k, v)| {
      (k.to_string(), v.to_string())
    })
    .collect();

    Self {
      map,
      sources: vec![]
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

    match resolve_rc_path(rc_override)? {
      | Some(path) => {
        info!(rc = %path.display(), "loading config");
        cfg.read_rc(&path)?;
      }
      | None => {
        debug!(
          "no config file found; \
           using defaults"
        );
      }
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

  pub fn get(
    &self,
    key: &str
  ) -> Option<&str> {
    self.map.get(key).map(String::as_str)
  }

  /// Reads an on/off setting. Values
  /// that are neither are an error so a
  /// typo never silently flips a
  /// switch.
  pub fn switch(
    &self,
    key: &str,
    default: bool
  ) -> anyhow::Result<bool> {
    match self.get(key) {
      | None => Ok(default),
      | Some(raw) => {
        parse_switch(raw).ok_or_else(
          || {
            anyhow!(
              "invalid {key} setting: \
               {raw} (expected on or \
               off)"
            )
          }
        )
      }
    }
  }

  pub fn confirm_deletes(
    &self
  ) -> anyhow::Result<bool> {
    self.switch("confirm", true)
  }

  pub fn color(
    &self
  ) -> anyhow::Result<bool> {
    self.switch("color", true)
  }

  fn read_rc(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let mut open = Vec::new();
    self.read_rc_nested(path, &mut open)
  }

  // `open` holds the chain of files
  // currently being read; meeting one
  // again means an include cycle.
  #[tracing::instrument(skip(
    self, open
  ))]
  fn read_rc_nested(
    &mut self,
    path: &Path,
    open: &mut Vec<PathBuf>
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let identity = fs::canonicalize(
      &path
    )
    .unwrap_or_else(|_| path.clone());

    if open.contains(&identity) {
      let chain = open
        .iter()
        .chain(std::iter::once(
          &identity
        ))
        .map(|p| {
          p.display().to_string()
        })
        .collect::<Vec<_>>()
        .join(" -> ");
      return Err(anyhow!(
        "config include cycle: {chain}"
      ));
    }

    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    open.push(identity);
    self.sources.push(path.clone());

    let base_dir = path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (idx, raw_line) in
      text.lines().enumerate()
    {
      let line = raw_line
        .split_once('#')
        .map_or(raw_line, |(kept, _)| {
          kept
        })
        .trim();
      if line.is_empty() {
        continue;
      }

      if let Some(target) =
        line.strip_prefix("include ")
      {
        let target = target.trim();
        if target.is_empty() {
          return Err(anyhow!(
            "{}:{}: include needs a \
             path",
            path.display(),
            idx + 1
          ));
        }
        let include =
          base_dir.join(expand_tilde(
            Path::new(target)
          ));
        if include.exists() {
          self.read_rc_nested(
            &include, open
          )?;
        } else {
          warn!(include = %include.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) =
        line.split_once('=').ok_or_else(
          || {
            anyhow!(
              "invalid config line \
               {}:{}: {}",
              path.display(),
              idx + 1,
              raw_line
            )
          }
        )?;
      trace!(key = %k.trim(), value = %v.trim(), "loaded config key");
      self.map.insert(
        k.trim().to_string(),
        v.trim().to_string()
      );
    }

    open.pop();
    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = match (
    override_dir,
    cfg.get("data.location")
  ) {
    | (Some(path), _) => {
      path.to_path_buf()
    }
    | (None, Some(location)) => {
      expand_tilde(Path::new(location))
    }
    | (None, None) => {
      dirs::data_dir()
        .or_else(dirs::home_dir)
        .map(|base| {
          base.join("taskdeck")
        })
        .ok_or_else(|| {
          anyhow!(
            "cannot determine data \
             directory"
          )
        })?
    }
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    return Ok(
      (rc_env != "/dev/null")
        .then(|| PathBuf::from(rc_env))
    );
  }

  let candidate = dirs::home_dir()
    .map(|home| {
      home.join(".taskdeckrc")
    })
    .filter(|path| path.exists());
  Ok(candidate)
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

fn parse_switch(
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

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::Config;

  #[test]
  fn reads_file_includes_and_overrides()
   {
    let temp = tempdir().unwrap();
    fs::write(
      temp.path().join("extra.rc"),
      "color = off\n"
    )
    .unwrap();
    let rc = temp.path().join("main.rc");
    fs::write(
      &rc,
      "# taskdeck settings\n\
       data.location = /tmp/decks # \
       trailing\n\
       include extra.rc\n"
    )
    .unwrap();

    let mut cfg =
      Config::load(Some(rc.as_path()))
        .unwrap();
    cfg.apply_overrides([(
      "rc.confirm".to_string(),
      "off".to_string()
    )]);

    assert_eq!(
      cfg.get("data.location"),
      Some("/tmp/decks")
    );
    assert!(!cfg.color().unwrap());
    assert!(
      !cfg.confirm_deletes().unwrap()
    );
    assert_eq!(cfg.sources.len(), 2);
  }

  #[test]
  fn rejects_lines_without_equals() {
    let temp = tempdir().unwrap();
    let rc = temp.path().join("bad.rc");
    fs::write(&rc, "color on\n").unwrap();

    assert!(
      Config::load(Some(rc.as_path()))
        .is_err()
    );
  }

  #[test]
  fn defaults_confirm_deletes() {
    assert!(
      Config::default()
        .confirm_deletes()
        .unwrap()
    );
  }

  #[test]
  fn unknown_confirm_value_is_an_error()
   {
    let temp = tempdir().unwrap();
    let rc = temp.path().join("main.rc");
    fs::write(&rc, "confirm = always\n")
      .unwrap();

    let cfg =
      Config::load(Some(rc.as_path()))
        .unwrap();

    let err =
      cfg.confirm_deletes().unwrap_err();
    assert!(
      err.to_string().contains("always")
    );
  }

  #[test]
  fn switch_accepts_common_spellings() {
    let mut cfg = Config::default();
    for (raw, expected) in [
      ("ON", true),
      ("yes", true),
      ("1", true),
      ("Off", false),
      ("no", false),
      ("false", false)
    ] {
      cfg.apply_overrides([(
        "confirm".to_string(),
        raw.to_string()
      )]);
      assert_eq!(
        cfg.confirm_deletes().unwrap(),
        expected,
        "{raw}"
      );
    }
  }

  #[test]
  fn include_cycle_is_an_error() {
    let temp = tempdir().unwrap();
    let a = temp.path().join("a.rc");
    let b = temp.path().join("b.rc");
    fs::write(
      &a,
      "color = on\ninclude b.rc\n"
    )
    .unwrap();
    fs::write(
      &b,
      "confirm = on\ninclude a.rc\n"
    )
    .unwrap();

    let err =
      Config::load(Some(a.as_path()))
        .unwrap_err();

    assert!(
      format!("{err:#}")
        .contains("include cycle")
    );
  }

  #[test]
  fn same_file_may_be_included_twice_without_cycle()
   {
    let temp = tempdir().unwrap();
    fs::write(
      temp.path().join("shared.rc"),
      "color = off\n"
    )
    .unwrap();
    let rc = temp.path().join("main.rc");
    fs::write(
      &rc,
      "include shared.rc\ninclude \
       shared.rc\n"
    )
    .unwrap();

    let cfg =
      Config::load(Some(rc.as_path()))
        .unwrap();

    assert_eq!(cfg.sources.len(), 3);
    assert!(!cfg.color().unwrap());
  }
}
