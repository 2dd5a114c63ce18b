// ABOUTME: Offline unit-file commands: render, inspect, patch-image, validate.
// ABOUTME: Pure text transformations over local files; no database or hosts involved.

use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use shipyard::descriptor::DeployDescriptor;
use shipyard::error::Result;
use shipyard::output::Output;
use shipyard::rollout::{ArtifactSource, DescriptorArtifacts};
use shipyard::types::{HostId, ReleaseId};
use shipyard::unit::{self, UnitDescriptor};

use crate::cli::RenderArgs;

/// Render a deploy descriptor to unit text (or its environment file).
pub fn render(args: &RenderArgs, output: &Output) -> Result<()> {
    let descriptor = DeployDescriptor::parse(&fs::read_to_string(&args.descriptor)?)?;
    descriptor.validate()?;

    if args.env_file {
        output.text(&descriptor.render_env_file());
        return Ok(());
    }

    let Some(release) = &args.release else {
        output.text(&descriptor.render()?);
        return Ok(());
    };

    let mut artifacts = DescriptorArtifacts::new(descriptor, &ReleaseId::new(release.as_str()))?;
    if let Some(owner) = args.owner {
        artifacts = artifacts.with_owner(owner);
    }
    let rendered = artifacts.render(&HostId::new("local"))?;
    output.text(&rendered.unit_text);
    Ok(())
}

#[derive(Serialize)]
struct Inspection {
    #[serde(flatten)]
    unit: UnitDescriptor,
    host_port: Option<u16>,
    required_host_directories: Vec<String>,
}

pub fn inspect(path: &Path, output: &Output) -> Result<()> {
    let text = fs::read_to_string(path)?;
    let unit = UnitDescriptor::parse(&text);
    let report = Inspection {
        host_port: unit.publish_port.as_ref().and(unit.extract_host_port().ok()),
        required_host_directories: unit.required_host_directories(),
        unit,
    };

    output.record(&report, || {
        let mut out = String::new();
        let unset = "-";
        let _ = writeln!(out, "image:        {}", report.unit.image.as_deref().unwrap_or(unset));
        let _ = writeln!(
            out,
            "publish port: {}",
            report.unit.publish_port.as_deref().unwrap_or(unset)
        );
        let _ = writeln!(
            out,
            "env file:     {}",
            report.unit.environment_file.as_deref().unwrap_or(unset)
        );
        let _ = writeln!(out, "network:      {}", report.unit.network.as_deref().unwrap_or(unset));
        for (name, value) in &report.unit.environment {
            if value.is_empty() {
                let _ = writeln!(out, "env:          {name} (from host)");
            } else {
                let _ = writeln!(out, "env:          {name}={value}");
            }
        }
        for dir in &report.required_host_directories {
            let _ = writeln!(out, "host dir:     {dir}");
        }
        out
    });

    // A declared but unparsable port is an error worth a non-zero exit.
    if report.unit.publish_port.is_some() {
        report.unit.extract_host_port()?;
    }
    Ok(())
}

pub fn patch_image(path: &Path, image: &str, in_place: bool, output: &Output) -> Result<()> {
    let text = fs::read_to_string(path)?;
    let patched = unit::replace_or_insert_image(&text, image)?;

    if in_place {
        fs::write(path, &patched)?;
        output.success(&format!("Set image of {} to {image}", path.display()));
    } else {
        output.text(&patched);
    }
    Ok(())
}

pub fn validate(path: &Path, output: &Output) -> Result<()> {
    unit::validate(&fs::read_to_string(path)?)?;
    output.success(&format!("{} is valid", path.display()));
    Ok(())
}
