#![allow(dead_code)]

use charter::Engine;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub const README: &str = "\
# Demo Service

## Overview

Demo service exposes a small HTTP API for tracking release notes across teams.
It keeps every release documented and versioned so operators can audit changes quickly.

## Installation

```bash
cargo install demo-service
```

## Usage

Run the binary with a configuration file and point it at your release notes directory.
See the [changelog](CHANGELOG.md) and the [protocol](PROTOCOL.md) for details.

## Contributing

Open a pull request with a changelog entry and keep the protocol version in sync with the ledger.
";

pub const CHANGELOG: &str = "\
# Changelog

## 1.0.0

- Initial release of the demo service with a documented protocol and rollback steps.
";

pub fn protocol(version: &str) -> String {
    format!(
        "\
# Operating Protocol

Version: {version}

## Version

This protocol is versioned with the release ledger and reviewed on every release.

## Safety

Changes ship behind feature flags, and every deployment is observed by the on-call engineer
before traffic is shifted.

## Rollback

Roll back by redeploying the previous tagged release and restoring the last configuration snapshot.
"
    )
}

/// Throwaway project directory
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    /// Every required document, section, field and metric in place
    pub fn complete() -> Self {
        Self::with_protocol_version("1.0.0")
    }

    pub fn with_protocol_version(version: &str) -> Self {
        let project = Self::empty();
        project.write("README.md", README);
        project.write("CHANGELOG.md", CHANGELOG);
        project.write("PROTOCOL.md", &protocol(version));
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(path, content).expect("write fixture file");
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path().join(relative)).expect("read fixture file")
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path().join(relative).exists()
    }

    pub fn engine(&self) -> Engine {
        Engine::for_project(self.path(), None).expect("build engine")
    }
}
