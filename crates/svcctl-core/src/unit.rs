//! Rendering of the process-supervision unit for one (service, configuration).

use crate::descriptor::Descriptor;
use crate::error::{Result, SvcError};
use crate::paths;
use crate::resolve::{self, ResolvedParameterSet};
use crate::template::{Syntax, Template};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A parsed unit template. Shared by every service that does not override it.
#[derive(Debug, Clone)]
pub struct UnitTemplate {
    source: PathBuf,
    template: Template,
}

impl UnitTemplate {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(Self {
            source: PathBuf::new(),
            template: Template::parse(text, Syntax::Unit)?,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SvcError::not_found("unit template", path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        let mut unit = Self::parse(&text)?;
        unit.source = path.to_path_buf();
        Ok(unit)
    }

    /// Template file this was loaded from; empty when parsed from a string.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Names the template needs, in template order.
    pub fn placeholders(&self) -> Vec<&str> {
        self.template.placeholders()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitText {
    pub name: String,
    pub path: PathBuf,
    pub text: String,
}

/// Render `template` with `params`. Any placeholder without a value fails
/// with `MissingParameter` naming the first one in template order.
pub fn render(template: &UnitTemplate, params: &ResolvedParameterSet, unit_dir: &Path) -> Result<UnitText> {
    let text = template
        .template
        .render(params)
        .map_err(|missing| SvcError::MissingParameter(missing.0))?;
    let name = params.unit_name().to_string();
    Ok(UnitText {
        path: paths::unit_path(unit_dir, &name),
        name,
        text,
    })
}

/// Resolve, load the service's template and render it.
pub fn render_for(descriptor: &Descriptor, service: &str, config: &str) -> Result<UnitText> {
    let params = resolve::resolve(descriptor, service, config)?;
    let service_def = descriptor.service(service)?;
    let template = UnitTemplate::load(&descriptor.template_path(service_def))?;
    tracing::debug!(
        service,
        config,
        template = %template.source().display(),
        "rendering unit"
    );
    render(&template, &params, &descriptor.unit_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;

    const GUNICORN_UNIT: &str = "\
[Unit]
Description={description}
After=network.target

[Service]
Type=simple
WorkingDirectory={HOME}
{#env}
Environment={key}={value}
{/env}
ExecStart={GUNICORN_CMD} --bind unix:/run/{SOCKET_NAME} --config {GUNICORN_CONFIG_PATH} {WSGI_MODULE}
StandardOutput=append:{LOGGING_DIR}/{SERVICE}.{CONFIG}.log
Restart=on-failure

[Install]
WantedBy=multi-user.target
";

    const DESCRIPTOR: &str = r#"
project: example
params:
  description: Example web
  GUNICORN_CMD: /opt/venv/bin/gunicorn
  GUNICORN_CONFIG_PATH: "{project}/gunicorn_config.py"
services:
  webapp:
    params:
      WSGI_MODULE: example.wsgi
      env:
        A: "1"
        B: "2"
    configs:
      dev:
        params:
          env:
            C: "3"
      bare:
  worker:
    configs: [dev]
"#;

    fn descriptor() -> Descriptor {
        Descriptor::from_yaml(DESCRIPTOR, "/srv/example").unwrap()
    }

    #[test]
    fn renders_full_unit() {
        let d = descriptor();
        let params = resolve(&d, "webapp", "dev").unwrap();
        let tpl = UnitTemplate::parse(GUNICORN_UNIT).unwrap();
        let unit = render(&tpl, &params, Path::new("/etc/systemd/system")).unwrap();
        let expected = "\
[Unit]
Description=Example web
After=network.target

[Service]
Type=simple
WorkingDirectory=/srv/example
Environment=A=1
Environment=B=2
Environment=C=3
ExecStart=/opt/venv/bin/gunicorn --bind unix:/run/webapp.dev.sock --config example/gunicorn_config.py example.wsgi
StandardOutput=append:/var/log/example/webapp/webapp.dev.log
Restart=on-failure

[Install]
WantedBy=multi-user.target
";
        assert_eq!(unit.text, expected);
        assert_eq!(unit.name, "example.webapp.dev.service");
        assert_eq!(
            unit.path,
            PathBuf::from("/etc/systemd/system/example.webapp.dev.service")
        );
    }

    #[test]
    fn env_block_keeps_insertion_order() {
        let d = descriptor();
        let params = resolve(&d, "webapp", "dev").unwrap();
        let tpl = UnitTemplate::parse(GUNICORN_UNIT).unwrap();
        let text = render(&tpl, &params, Path::new("/u")).unwrap().text;
        let a = text.find("Environment=A=1").unwrap();
        let b = text.find("Environment=B=2").unwrap();
        assert!(a < b);
    }

    #[test]
    fn rendering_is_deterministic() {
        let d = descriptor();
        let params = resolve(&d, "webapp", "dev").unwrap();
        let tpl = UnitTemplate::parse(GUNICORN_UNIT).unwrap();
        let first = render(&tpl, &params, Path::new("/u")).unwrap();
        let second = render(&tpl, &params, Path::new("/u")).unwrap();
        assert_eq!(first.text.as_bytes(), second.text.as_bytes());
    }

    #[test]
    fn block_lines_vanish_from_output() {
        let d = descriptor();
        let params = resolve(&d, "webapp", "bare").unwrap();
        let tpl = UnitTemplate::parse("[Service]\n{#env}\nEnvironment={key}={value}\n{/env}\nType=simple\n").unwrap();
        let text = render(&tpl, &params, Path::new("/u")).unwrap().text;
        assert_eq!(text, "[Service]\nEnvironment=A=1\nEnvironment=B=2\nType=simple\n");
    }

    #[test]
    fn missing_parameter_names_first_gap() {
        let d = descriptor();
        let params = resolve(&d, "worker", "dev").unwrap();
        let tpl = UnitTemplate::parse(GUNICORN_UNIT).unwrap();
        let err = render(&tpl, &params, Path::new("/u")).unwrap_err();
        match err {
            SvcError::MissingParameter(name) => assert_eq!(name, "WSGI_MODULE"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn placeholders_are_listed_in_order() {
        let tpl = UnitTemplate::parse("{description}\n{#env}\n{key}={value}\n{/env}\n{HOME}\n").unwrap();
        assert_eq!(tpl.placeholders(), vec!["description", "key", "value", "HOME"]);
    }

    #[test]
    fn render_for_loads_service_template() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("templates")).unwrap();
        std::fs::write(
            dir.path().join("templates/service.unit"),
            "[Service]\nExecStart=/bin/run {SERVICE} {CONFIG}\n",
        )
        .unwrap();
        let d = Descriptor::from_yaml("project: p\nservices:\n  api:\n    configs: [dev]\n", dir.path()).unwrap();
        let unit = render_for(&d, "api", "dev").unwrap();
        assert_eq!(unit.text, "[Service]\nExecStart=/bin/run api dev\n");
        assert_eq!(unit.name, "p.api.dev.service");
    }

    #[test]
    fn demo_descriptor_renders() {
        let d = Descriptor::from_yaml(include_str!("../../../demos/svcctl.yaml"), "/srv/demo").unwrap();
        let params = resolve(&d, "webapp", "prod").unwrap();
        let tpl = UnitTemplate::parse(include_str!("../../../demos/templates/systemd.gunicorn.service")).unwrap();
        let unit = render(&tpl, &params, &d.unit_dir).unwrap();
        assert_eq!(unit.path, PathBuf::from("/etc/systemd/system/example.webapp.prod.service"));
        assert!(unit.text.contains("Description=Example web service (webapp/prod)\n"));
        assert!(unit.text.contains("WorkingDirectory=/srv/example\n"));
        assert!(unit.text.contains("\nEnvironment=EXAMPLE_LOG_LEVEL=info\n"));
        assert!(unit.text.contains(
            "ExecStart=/opt/example/venv/bin/gunicorn --bind unix:/run/webapp.prod.sock \
             --config /etc/example/gunicorn_config.py example.wsgi\n"
        ));
        assert!(unit.text.contains("StandardOutput=append:/var/log/example/webapp/webapp.prod.log\n"));
    }

    #[test]
    fn render_for_reports_missing_template() {
        let dir = tempfile::TempDir::new().unwrap();
        let d = Descriptor::from_yaml("project: p\nservices:\n  api:\n    configs: [dev]\n", dir.path()).unwrap();
        let err = render_for(&d, "api", "dev").unwrap_err();
        assert!(matches!(err, SvcError::NotFound { kind: "unit template", .. }));
    }
}
