use assert_cmd::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn write_scene() -> NamedTempFile {
    let scene = r#"<scene>
  <camera>
    <position>0 0 3</position>
    <yaw>-90</yaw>
    <pitch>0</pitch>
    <fov>45</fov>
  </camera>
  <light>
    <type>point</type>
    <position>2 2 2</position>
    <color>255 255 255</color>
    <intensity>1</intensity>
  </light>
</scene>
"#;
    let mut tmp = NamedTempFile::new().expect("temp scene");
    tmp.write_all(scene.as_bytes()).expect("write scene");
    tmp
}

#[test]
fn summary_mode_prints_the_derived_camera_state() {
    let scene = write_scene();
    let mut cmd = Command::cargo_bin("rayview").expect("binary exists");
    cmd.arg(scene.path()).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 1 light(s)"))
        .stdout(contains("Camera eye=(0.00, 0.00, 3.00) yaw=-90.0 pitch=0.0 fov=45.0"))
        // yaw -90, pitch 0 looks straight down -Z
        .stdout(contains("0.00, -1.00)"))
        .stdout(contains("Center ray="))
        .stdout(contains("Ambient sky=("));
}

#[test]
fn summary_mode_works_without_a_scene_file() {
    let mut cmd = Command::cargo_bin("rayview").expect("binary exists");
    cmd.arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Camera forward="));
}

#[test]
fn unknown_flags_are_rejected() {
    let mut cmd = Command::cargo_bin("rayview").expect("binary exists");
    cmd.arg("--frobnicate");
    cmd.assert().failure();
}
