// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Degradation passes — generate the XML descriptor consumed by the external
// stain/noise tool and invoke it as a blocking subprocess.
//
// Descriptor schema (fixed by the tool):
//   <root>
//     <alias id="INPUT" value="..."/>
//     <image id="my-image"><load file="INPUT"/></image>
//     <image id="my-copy"><copy ref="my-image"/></image>
//     <gradient-degradations ref="my-copy">
//       <strength>0.15</strength>
//       <density>2.10</density>
//       <iterations>750</iterations>
//       <source>/path/to/stains</source>
//     </gradient-degradations>
//     <save ref="my-copy" file="..."/>
//   </root>

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use rand::Rng;
use scriptorium_core::error::{Result, ScriptoriumError};
use tracing::{debug, info, instrument};

/// One gradient-degradation block in the descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientDegradation {
    pub strength: f64,
    pub density: f64,
    pub iterations: u32,
    /// Stain texture directory the tool samples from.
    pub source: PathBuf,
}

/// A complete degradation descriptor: input alias, working copy, one or
/// more degradation blocks, and the save target.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub input: PathBuf,
    pub output: PathBuf,
    pub degradations: Vec<GradientDegradation>,
}

impl Descriptor {
    /// Serialize to the tool's XML schema.
    pub fn to_xml(&self) -> Result<String> {
        let xml_err = |e: quick_xml::Error| ScriptoriumError::Descriptor(e.to_string());

        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .write_event(Event::Start(BytesStart::new("root")))
            .map_err(xml_err)?;

        let mut alias = BytesStart::new("alias");
        alias.push_attribute(("id", "INPUT"));
        alias.push_attribute(("value", self.input.to_string_lossy().as_ref()));
        writer.write_event(Event::Empty(alias)).map_err(xml_err)?;

        let mut image = BytesStart::new("image");
        image.push_attribute(("id", "my-image"));
        writer.write_event(Event::Start(image)).map_err(xml_err)?;
        let mut load = BytesStart::new("load");
        load.push_attribute(("file", "INPUT"));
        writer.write_event(Event::Empty(load)).map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("image")))
            .map_err(xml_err)?;

        let mut copy_image = BytesStart::new("image");
        copy_image.push_attribute(("id", "my-copy"));
        writer.write_event(Event::Start(copy_image)).map_err(xml_err)?;
        let mut copy = BytesStart::new("copy");
        copy.push_attribute(("ref", "my-image"));
        writer.write_event(Event::Empty(copy)).map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("image")))
            .map_err(xml_err)?;

        for block in &self.degradations {
            let mut grad = BytesStart::new("gradient-degradations");
            grad.push_attribute(("ref", "my-copy"));
            writer.write_event(Event::Start(grad)).map_err(xml_err)?;

            write_text_element(&mut writer, "strength", &format!("{:.2}", block.strength))
                .map_err(xml_err)?;
            write_text_element(&mut writer, "density", &format!("{:.2}", block.density))
                .map_err(xml_err)?;
            write_text_element(&mut writer, "iterations", &block.iterations.to_string())
                .map_err(xml_err)?;
            write_text_element(&mut writer, "source", &block.source.to_string_lossy())
                .map_err(xml_err)?;

            writer
                .write_event(Event::End(BytesEnd::new("gradient-degradations")))
                .map_err(xml_err)?;
        }

        let mut save = BytesStart::new("save");
        save.push_attribute(("ref", "my-copy"));
        save.push_attribute(("file", self.output.to_string_lossy().as_ref()));
        writer.write_event(Event::Empty(save)).map_err(xml_err)?;

        writer
            .write_event(Event::End(BytesEnd::new("root")))
            .map_err(xml_err)?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| ScriptoriumError::Descriptor(e.to_string()))
    }

    /// Write the descriptor XML to `path`.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_xml()?)?;
        debug!(path = %path.display(), "degradation descriptor written");
        Ok(())
    }
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    text: &str,
) -> std::result::Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Sample one degradation block.
///
/// The strength range scales linearly with the configured stain level:
/// U(0.1·level, 0.1 + 0.1·level).  The density range is degenerate at
/// 2 + 0.1·level — an empirically chosen constant from the original recipe,
/// preserved rather than reinterpreted.
pub fn sample_degradation(
    rng: &mut impl Rng,
    stain_level: u32,
    iterations: u32,
    stain_dir: &Path,
) -> GradientDegradation {
    let level = f64::from(stain_level);
    let strength_low = 0.1 * level;
    let strength_high = 0.1 + 0.1 * level;
    let density_low = 2.0 + 0.1 * level;
    let density_high = 2.0 + 0.1 * level;

    GradientDegradation {
        strength: rng.random_range(strength_low..=strength_high),
        density: rng.random_range(density_low..=density_high),
        iterations,
        source: stain_dir.to_path_buf(),
    }
}

/// Descriptor and output paths for one pass of one document,
/// e.g. `degradation_script_12345_1.xml` / `degraded_12345_1.png`.
pub fn pass_paths(tmp_dir: &Path, seed: u64, pass_index: u32) -> (PathBuf, PathBuf) {
    let xml = tmp_dir.join(format!("degradation_script_{seed}_{pass_index}.xml"));
    let output = tmp_dir.join(format!("degraded_{seed}_{pass_index}.png"));
    (xml, output)
}

/// Run the external degradation tool on a written descriptor.
///
/// Blocking call, no timeout, no retry.  Any non-zero exit code is an error
/// for the calling document's task; sibling tasks are unaffected.
#[instrument(skip(command), fields(descriptor = %descriptor.display()))]
pub fn run_tool(command: &[String], descriptor: &Path) -> Result<()> {
    let (program, args) = command.split_first().ok_or_else(|| {
        ScriptoriumError::Degradation("degradation command is empty".to_string())
    })?;

    info!(%program, "invoking degradation tool");
    let status = Command::new(program)
        .args(args)
        .arg(descriptor)
        .stdout(Stdio::null())
        .status()
        .map_err(|e| {
            ScriptoriumError::Degradation(format!("failed to launch {program}: {e}"))
        })?;

    if !status.success() {
        return Err(ScriptoriumError::Degradation(format!(
            "{program} exited with {status} for {}",
            descriptor.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn descriptor() -> Descriptor {
        Descriptor {
            input: PathBuf::from("/tmp/background.png"),
            output: PathBuf::from("/tmp/degraded_42_1.png"),
            degradations: vec![GradientDegradation {
                strength: 0.15,
                density: 2.1,
                iterations: 750,
                source: PathBuf::from("/corpora/stains"),
            }],
        }
    }

    #[test]
    fn xml_carries_all_directives() {
        let xml = descriptor().to_xml().unwrap();
        assert!(xml.contains(r#"<alias id="INPUT" value="/tmp/background.png"/>"#));
        assert!(xml.contains(r#"<load file="INPUT"/>"#));
        assert!(xml.contains(r#"<copy ref="my-image"/>"#));
        assert!(xml.contains(r#"<gradient-degradations ref="my-copy">"#));
        assert!(xml.contains("<strength>0.15</strength>"));
        assert!(xml.contains("<density>2.10</density>"));
        assert!(xml.contains("<iterations>750</iterations>"));
        assert!(xml.contains("<source>/corpora/stains</source>"));
        assert!(xml.contains(r#"<save ref="my-copy" file="/tmp/degraded_42_1.png"/>"#));
    }

    #[test]
    fn sampled_strength_scales_with_stain_level() {
        let stains = PathBuf::from("/stains");
        let mut rng = StdRng::seed_from_u64(5);
        for level in 1..=5 {
            let block = sample_degradation(&mut rng, level, 750, &stains);
            let low = 0.1 * f64::from(level);
            let high = 0.1 + 0.1 * f64::from(level);
            assert!(block.strength >= low && block.strength <= high);
            assert!((block.density - (2.0 + 0.1 * f64::from(level))).abs() < 1e-9);
            assert_eq!(block.iterations, 750);
        }
    }

    #[test]
    fn pass_paths_encode_seed_and_index() {
        let (xml, out) = pass_paths(Path::new("/dev/shm"), 777, 2);
        assert_eq!(xml, PathBuf::from("/dev/shm/degradation_script_777_2.xml"));
        assert_eq!(out, PathBuf::from("/dev/shm/degraded_777_2.png"));
    }

    #[test]
    fn empty_command_is_an_error() {
        let err = run_tool(&[], Path::new("/tmp/x.xml")).unwrap_err();
        assert!(matches!(err, ScriptoriumError::Degradation(_)));
    }

    #[test]
    fn failing_tool_propagates() {
        let command = vec!["false".to_string()];
        let err = run_tool(&command, Path::new("/tmp/x.xml")).unwrap_err();
        assert!(matches!(err, ScriptoriumError::Degradation(_)));
    }

    #[test]
    fn succeeding_tool_is_ok() {
        let command = vec!["true".to_string()];
        run_tool(&command, Path::new("/tmp/x.xml")).unwrap();
    }
}
