// SPDX-License-Identifier: MPL-2.0

use std::io::Read;
use std::process::exit;

use anyhow::Context;

use elm_wrap_core::config::Config;
use elm_wrap_core::install_env::{HttpResponse, HttpSession, InstallEnv, Protocol, SinceResponse};
use elm_wrap_core::project_config::{diff_install_plan, ExactVersionMap, ProjectConfig};
use elm_wrap_core::solver::{self, VersionStrategy};

const HELP: &str = r#"
elm-wrap

Solve dependencies of an Elm project and print the resulting install plan.
By default, try offline first and fall back to online if that fails.

USAGE:
    elm-wrap [FLAGS...]
    For example:
        elm-wrap
        elm-wrap --help
        elm-wrap --offline
        elm-wrap --online-newest
        elm-wrap --online-oldest
        elm-wrap --test

FLAGS:
    --help                 Print this message and exit
    --offline              No network request, use only installed packages
    --online-newest        Use the newest compatible version
    --online-oldest        Use the oldest compatible version
    --test                 Solve with both normal and test dependencies
"#;

/// Talks to the official Elm package server over `ureq`. The only piece of
/// this binary that actually performs network I/O; everything else in
/// `elm-wrap-core` only ever sees the [`HttpSession`] trait.
struct UreqSession;

impl HttpSession for UreqSession {
    fn get(&self, url: &str, etag: Option<&str>) -> Result<HttpResponse, String> {
        let mut request = ureq::get(url).timeout_connect(10_000);
        if let Some(etag) = etag {
            request = request.set("If-None-Match", etag);
        }
        let response = request.call();
        if response.status() == 304 {
            return Ok(HttpResponse::NotModified);
        }
        if !response.ok() {
            return Err(format!("GET {} returned status {}", url, response.status()));
        }
        let etag = response.header("ETag").map(str::to_string);
        let mut body = Vec::new();
        response.into_reader().read_to_end(&mut body).map_err(|e| e.to_string())?;
        Ok(HttpResponse::Ok { body, etag })
    }

    fn since(&self, base_url: &str, since_count: u64) -> Result<SinceResponse, String> {
        let url = format!("{}/all-packages/since/{}", base_url, since_count);
        let response = ureq::get(&url).timeout_connect(10_000).call();
        if !response.ok() {
            return Err(format!("GET {} returned status {}", url, response.status()));
        }
        let body = response.into_string().map_err(|e| e.to_string())?;
        let entries: Vec<String> = serde_json::from_str(&body).map_err(|e| e.to_string())?;
        Ok(SinceResponse::Delta(entries))
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options: Vec<&str> = args.iter().map(String::as_str).collect();

    if options.contains(&"--help") {
        println!("{}", HELP);
        exit(0);
    }

    let use_test = options.contains(&"--test");
    let force_offline = options.contains(&"--offline");
    let strategy = if options.contains(&"--online-oldest") {
        VersionStrategy::Oldest
    } else {
        VersionStrategy::Newest
    };

    let elm_json_str = std::fs::read_to_string("elm.json").context("are you in an elm project? couldn't read elm.json")?;
    let project: ProjectConfig = serde_json::from_str(&elm_json_str).context("failed to decode elm.json")?;

    let config = Config::from_env();
    let offline = force_offline || config.offline;

    let mut env = InstallEnv::new(
        config.elm_home.clone(),
        Protocol::V1 {
            registry_url: "https://package.elm-lang.org".to_string(),
        },
        Box::new(UreqSession),
        offline,
        false,
    );
    env.init().context("failed to set up the install environment")?;
    if !offline && !config.skip_registry_update {
        env.refresh().context("failed to refresh the package registry")?;
    }

    let solution = solver::solve_deps_with(&env, &project, use_test, &[], strategy);

    match solution {
        Ok(solution) => {
            print_install_plan(&project, &solution.direct, &solution.indirect);
            println!("{}", serde_json::to_string_pretty(&solution)?);
        }
        Err(failure) => {
            eprintln!("{}", failure.report(16_384).text);
            exit(1);
        }
    }

    Ok(())
}

fn print_install_plan(project: &ProjectConfig, direct: &ExactVersionMap, indirect: &ExactVersionMap) {
    let previous = match project {
        ProjectConfig::Application(app) => {
            let mut previous = app.dependencies.direct.clone();
            previous.extend(app.dependencies.indirect.clone());
            previous
        }
        ProjectConfig::Package(_) => ExactVersionMap::new(),
    };

    let mut solved = direct.clone();
    solved.extend(indirect.clone());

    let plan = diff_install_plan(&previous, &solved);
    if plan.is_empty() {
        eprintln!("Nothing to change, dependencies are already up to date.");
        return;
    }
    eprintln!("Install plan:");
    for change in &plan {
        eprintln!("  {}", change);
    }
}
