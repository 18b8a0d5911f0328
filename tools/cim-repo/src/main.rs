// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Offline maintenance tool for a CIM repository: inspect namespaces, classes and instances,
//! manage namespaces, compact instance files and run crash recovery.

use clap::{Parser, Subcommand};
use clap_derive::Parser as DeriveParser;
use cim_common::ObjectPath;
use cim_repository::{NamespaceDefinition, Repository, RepositoryConfig};
use eyre::{Report, eyre};
use figment::Figment;
use figment::providers::{Format, Serialized, Yaml};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(DeriveParser, Debug)]
#[command(name = "cim-repo")]
#[command(about = "Offline maintenance tool for CIM repositories", long_about = None)]
struct Args {
    #[arg(
        long,
        value_name = "root",
        help = "Repository directory (overrides the configuration file)"
    )]
    root: Option<PathBuf>,

    #[arg(
        long,
        value_name = "config",
        help = "YAML file with repository settings"
    )]
    config_file: Option<PathBuf>,

    #[arg(long, help = "Enable debug logging")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List namespaces and their sharing attributes.
    Namespaces,
    /// List class names below a class, or the root classes.
    Classes {
        namespace: String,
        #[arg(long, help = "Start from this class instead of the root classes")]
        class: Option<String>,
        #[arg(long, help = "Include indirect subclasses")]
        deep: bool,
    },
    /// List the instances of a class and its subclasses.
    Instances {
        namespace: String,
        class: String,
        #[arg(long, help = "Print only the instance paths")]
        names_only: bool,
    },
    /// Print one instance.
    Instance { namespace: String, path: String },
    /// Create a namespace; primary unless `--parent` is given.
    CreateNamespace {
        namespace: String,
        #[arg(long, help = "Take schema from this namespace")]
        parent: Option<String>,
        #[arg(long, help = "Do not allow schema updates")]
        read_only: bool,
        #[arg(long, help = "Allow other namespaces to share this one's schema")]
        shareable: bool,
        #[arg(long, help = "Location of the remote repository holding this namespace")]
        remote: Option<String>,
    },
    /// Delete an empty namespace.
    DeleteNamespace { namespace: String },
    /// Compact the instance files of one class.
    Compact { namespace: String, class: String },
    /// Open the repository, settle interrupted transactions and report what was repaired.
    Recover,
}

impl Args {
    /// Defaults, then the YAML file if given, then `--root`.
    fn load_config(&self) -> Result<RepositoryConfig, Report> {
        let mut figment = Figment::new().merge(Serialized::defaults(RepositoryConfig::default()));
        if let Some(config_file) = &self.config_file {
            figment = figment.merge(Yaml::file(config_file));
        }
        let mut config: RepositoryConfig = figment.extract().map_err(|e| {
            eyre!(
                "Failed to parse configuration from {:?}: {}",
                self.config_file,
                e
            )
        })?;
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        Ok(config)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Report> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<(), Report> {
    color_eyre::install()?;
    let args = Args::parse();
    cim_common::tracing::init_tracing(args.debug)?;

    let config = args.load_config()?;
    info!(root = %config.root.display(), "opening repository");
    let repo = Repository::open(config)?;

    match args.command {
        Command::Namespaces => {
            let namespaces = repo
                .enumerate_name_spaces()
                .iter()
                .map(|ns| repo.get_name_space_attributes(ns))
                .collect::<Result<Vec<_>, _>>()?;
            print_json(&namespaces)?;
        }
        Command::Classes {
            namespace,
            class,
            deep,
        } => {
            for name in repo.enumerate_class_names(&namespace, class.as_deref(), deep)? {
                println!("{name}");
            }
        }
        Command::Instances {
            namespace,
            class,
            names_only,
        } => {
            if names_only {
                for path in repo.enumerate_instance_names(&namespace, &class)? {
                    println!("{path}");
                }
            } else {
                print_json(&repo.enumerate_instances(&namespace, &class)?)?;
            }
        }
        Command::Instance { namespace, path } => {
            let path: ObjectPath = path.parse()?;
            print_json(&repo.get_instance(&namespace, &path)?)?;
        }
        Command::CreateNamespace {
            namespace,
            parent,
            read_only,
            shareable,
            remote,
        } => {
            repo.create_name_space(&NamespaceDefinition {
                name: namespace.clone(),
                shareable,
                updates_allowed: !read_only,
                parent,
                remote_info: remote,
            })?;
            info!(%namespace, "created namespace");
        }
        Command::DeleteNamespace { namespace } => {
            repo.delete_name_space(&namespace)?;
            info!(%namespace, "deleted namespace");
        }
        Command::Compact { namespace, class } => {
            repo.compact(&namespace, &class)?;
            info!(%namespace, %class, "compacted instance files");
        }
        Command::Recover => {
            let report = repo.recovery_report();
            if report.is_clean() {
                println!("repository is consistent");
            } else {
                print_json(&report)?;
            }
        }
    }
    Ok(())
}
