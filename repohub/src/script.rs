//! Installation script generation.
//!
//! Scripts are a pure function of the platform, the ordered package
//! selection and the generation time. Every package goes through a guard
//! that asks the package manager whether it is already installed, and the
//! install verbs used are the managers' non-reinstalling ones, so running a
//! script twice only does work the first time.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;

use crate::error::ScriptError;
use crate::models::{Package, PackageType, Platform};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedScript {
    pub platform: String,
    pub script: String,
    pub packages: Vec<Package>,
    pub generated_at: DateTime<Utc>,
}

/// Shell dialect and commands for one package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptTemplate {
    Apt,
    Dnf,
    Pacman,
    Brew,
    Winget,
}

impl ScriptTemplate {
    pub fn for_package_manager(package_manager: &str) -> Result<Self, ScriptError> {
        match package_manager {
            "apt" | "apt-get" => Ok(Self::Apt),
            "dnf" | "yum" => Ok(Self::Dnf),
            "pacman" => Ok(Self::Pacman),
            "brew" | "homebrew" => Ok(Self::Brew),
            "winget" => Ok(Self::Winget),
            other => Err(ScriptError::UnsupportedPackageManager(other.to_string())),
        }
    }

    fn is_powershell(&self) -> bool {
        matches!(self, Self::Winget)
    }

    fn preamble(&self) -> &'static str {
        match self {
            Self::Apt | Self::Dnf | Self::Pacman => BASH_SUDO_PREAMBLE,
            Self::Brew => "set -euo pipefail\n",
            Self::Winget => "$ErrorActionPreference = 'Stop'\n",
        }
    }

    fn functions(&self) -> &'static str {
        match self {
            Self::Apt => {
                r#"install_package() {
  if dpkg -s "$1" >/dev/null 2>&1; then
    echo "$1 is already installed"
  else
    echo "Installing $1..."
    $SUDO apt-get install -y "$1"
  fi
}
"#
            }
            Self::Dnf => {
                r#"install_package() {
  if rpm -q "$1" >/dev/null 2>&1; then
    echo "$1 is already installed"
  else
    echo "Installing $1..."
    $SUDO dnf install -y "$1"
  fi
}
"#
            }
            Self::Pacman => {
                r#"install_package() {
  if pacman -Qi "$1" >/dev/null 2>&1; then
    echo "$1 is already installed"
  else
    echo "Installing $1..."
    $SUDO pacman -S --needed --noconfirm "$1"
  fi
}
"#
            }
            Self::Brew => {
                r#"install_package() {
  if brew list --formula "$1" >/dev/null 2>&1; then
    echo "$1 is already installed"
  else
    echo "Installing $1..."
    brew install "$1"
  fi
}

install_cask() {
  if brew list --cask "$1" >/dev/null 2>&1; then
    echo "$1 is already installed"
  else
    echo "Installing $1..."
    brew install --cask "$1"
  fi
}
"#
            }
            Self::Winget => {
                r#"function Install-Package([string]$Id) {
    winget list --id $Id --exact --accept-source-agreements | Out-Null
    if ($LASTEXITCODE -eq 0) {
        Write-Host "$Id is already installed"
    } else {
        Write-Host "Installing $Id..."
        winget install --id $Id --exact --silent --accept-package-agreements --accept-source-agreements
    }
}
"#
            }
        }
    }

    /// Index refresh run once before any install.
    fn refresh(&self) -> Option<&'static str> {
        match self {
            Self::Apt => Some("$SUDO apt-get update"),
            Self::Brew => Some("brew update"),
            Self::Dnf | Self::Pacman | Self::Winget => None,
        }
    }

    fn install_line(&self, package: &Package) -> String {
        match self {
            Self::Winget => format!("Install-Package {}", powershell_quote(&package.id)),
            Self::Brew if package.package_type == PackageType::Gui => {
                format!("install_cask {}", shell_words::quote(&package.id))
            }
            _ => format!("install_package {}", shell_words::quote(&package.id)),
        }
    }
}

const BASH_SUDO_PREAMBLE: &str = r#"set -euo pipefail

SUDO=""
if [ "$(id -u)" -ne 0 ]; then
  SUDO="sudo"
fi
"#;

/// Renders the installation script for `packages` in the order given.
pub fn generate(platform: &Platform, packages: &[Package]) -> Result<GeneratedScript, ScriptError> {
    generate_at(platform, packages, Utc::now())
}

pub fn generate_at(
    platform: &Platform,
    packages: &[Package],
    generated_at: DateTime<Utc>,
) -> Result<GeneratedScript, ScriptError> {
    let template = ScriptTemplate::for_package_manager(&platform.package_manager)?;
    let script = render(&template, platform, packages, generated_at);

    Ok(GeneratedScript {
        platform: platform.id.clone(),
        script,
        packages: packages.to_vec(),
        generated_at,
    })
}

fn render(
    template: &ScriptTemplate,
    platform: &Platform,
    packages: &[Package],
    generated_at: DateTime<Utc>,
) -> String {
    let mut script = String::new();

    // Writing to a String cannot fail
    if !template.is_powershell() {
        script.push_str("#!/usr/bin/env bash\n");
    }
    let _ = writeln!(
        script,
        "# Installation script for {} ({})",
        platform.name, platform.package_manager
    );
    let _ = writeln!(script, "# Generated by RepoHub at {}", generated_at.to_rfc3339());
    let _ = writeln!(script, "# Packages: {}", packages.len());
    let _ = writeln!(script, "#");
    let _ = writeln!(
        script,
        "# Safe to run more than once: installed packages are skipped."
    );
    script.push('\n');

    script.push_str(template.preamble());
    script.push('\n');
    script.push_str(template.functions());
    script.push('\n');

    if packages.is_empty() {
        if template.is_powershell() {
            script.push_str("Write-Host \"No packages selected.\"\n");
        } else {
            script.push_str("echo \"No packages selected.\"\n");
        }
        return script;
    }

    if let Some(refresh) = template.refresh() {
        script.push_str(refresh);
        script.push('\n');
    }
    for package in packages {
        script.push_str(&template.install_line(package));
        script.push('\n');
    }

    script.push('\n');
    if template.is_powershell() {
        script.push_str("Write-Host \"All packages installed.\"\n");
    } else {
        script.push_str("echo \"All packages installed.\"\n");
    }

    script
}

fn powershell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
