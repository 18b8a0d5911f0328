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

//! Log output for the repository tools. Diagnostics go to stderr; stdout carries only
//! command output.

use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

const CRATES: [&str; 3] = ["cim_common", "cim_repository", "cim_repo"];

/// `RUST_LOG` when set, otherwise `debug` or `info` for this workspace's crates and `warn`
/// for everything else.
fn env_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if debug { "debug" } else { "info" };
        let directives: Vec<String> = CRATES.iter().map(|c| format!("{c}={level}")).collect();
        EnvFilter::new(format!("warn,{}", directives.join(",")))
    })
}

/// Install a compact stderr subscriber. With `debug`, source locations are included too.
pub fn init_tracing(debug: bool) -> Result<(), eyre::Report> {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(debug)
                .with_file(debug)
                .with_line_number(debug),
        )
        .with(env_filter(debug))
        .try_init()
        .map_err(|e| eyre::eyre!("could not install tracing subscriber: {e}"))
}
