use anyhow::anyhow;
use serde::{
  Deserialize,
  Serialize
};

use crate::slot::{
  HoursError,
  OperatingHours
};

/// Facility settings as edited on the
/// admin settings page. Times are kept as
/// `"HH:MM"` strings, the way the backend
/// stores them.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(default)]
pub struct FacilitySettings {
  #[serde(alias = "courtName")]
  pub court_name:   String,
  pub address:      String,
  #[serde(alias = "openingTime")]
  pub opening_time: String,
  #[serde(alias = "closingTime")]
  pub closing_time: String,
  pub facilities:   Vec<String>,
  #[serde(alias = "courtRules")]
  pub court_rules:  Vec<String>
}

impl Default for FacilitySettings {
  fn default() -> Self {
    Self {
      court_name:   String::new(),
      address:      String::new(),
      opening_time: "06:00".to_string(),
      closing_time: "23:00".to_string(),
      facilities:   vec![],
      court_rules:  vec![]
    }
  }
}

impl FacilitySettings {
  #[must_use]
  pub fn operating_hours(
    &self
  ) -> OperatingHours {
    OperatingHours::from_settings(
      &self.opening_time,
      &self.closing_time
    )
  }

  /// Validates before storing, so saved
  /// settings always yield the intended
  /// window.
  pub fn set_hours(
    &mut self,
    opening: &str,
    closing: &str
  ) -> Result<OperatingHours, HoursError>
  {
    let hours =
      OperatingHours::parse(opening, closing)?;
    self.opening_time =
      format!("{:02}:00", hours.opening_hour());
    self.closing_time =
      format!("{:02}:00", hours.closing_hour());
    Ok(hours)
  }

  pub fn add_facility(
    &mut self,
    name: &str
  ) -> anyhow::Result<()> {
    push_trimmed(
      &mut self.facilities,
      name,
      "facility"
    )
  }

  pub fn remove_facility(
    &mut self,
    position: usize
  ) -> anyhow::Result<String> {
    remove_at(
      &mut self.facilities,
      position,
      "facility"
    )
  }

  pub fn add_rule(
    &mut self,
    rule: &str
  ) -> anyhow::Result<()> {
    push_trimmed(
      &mut self.court_rules,
      rule,
      "court rule"
    )
  }

  pub fn remove_rule(
    &mut self,
    position: usize
  ) -> anyhow::Result<String> {
    remove_at(
      &mut self.court_rules,
      position,
      "court rule"
    )
  }
}

fn push_trimmed(
  list: &mut Vec<String>,
  raw: &str,
  what: &str
) -> anyhow::Result<()> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(anyhow!(
      "{what} cannot be empty"
    ));
  }
  list.push(trimmed.to_string());
  Ok(())
}

/// `position` is 1-based, as listed.
fn remove_at(
  list: &mut Vec<String>,
  position: usize,
  what: &str
) -> anyhow::Result<String> {
  if position == 0 || position > list.len()
  {
    return Err(anyhow!(
      "no {what} at position {position}"
    ));
  }
  Ok(list.remove(position - 1))
}
