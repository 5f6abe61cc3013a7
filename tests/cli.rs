use assert_cmd::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn write_scene() -> NamedTempFile {
    let scene = r#"<scene>
  <settings>
    <background>0 0 0</background>
    <light-depth>test</light-depth>
  </settings>
  <camera><position>0 20 -40</position></camera>
  <texture><name>grey</name><solid>128 128 128</solid></texture>
  <material><name>plain</name><diffuse>grey</diffuse></material>
  <entity>
    <name>floor</name>
    <role>ground</role>
    <mesh>cube</mesh>
    <material>plain</material>
    <scale>10 0.1 10</scale>
  </entity>
  <point-light>
    <name>lamp</name>
    <color>255 255 255</color>
    <position>0 2 0</position>
    <range>4</range>
  </point-light>
</scene>
"#;
    let mut tmp = NamedTempFile::new().expect("temp scene");
    tmp.write_all(scene.as_bytes()).expect("write scene");
    tmp
}

#[test]
fn summary_of_built_in_scene() {
    let mut cmd = Command::cargo_bin("deferred-shading").expect("binary exists");
    cmd.arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 15 entities (2 lights)"))
        .stdout(contains(" - ground (Ground) pos=(0.00, -1.50, 0.00)"))
        .stdout(contains("Frame plan: 13 geometry draws, 2 light volumes (light depth: test)"))
        .stdout(contains(" - blue_light: point"))
        .stdout(contains(" - spot_light: spot"));
}

#[test]
fn summary_of_scene_file() {
    let scene = write_scene();
    let mut cmd = Command::cargo_bin("deferred-shading").expect("binary exists");
    cmd.arg(scene.path()).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 2 entities (1 lights)"))
        .stdout(contains(" - floor (Ground)"))
        .stdout(contains("Assets: 2 meshes, 2 textures, 1 materials"))
        .stdout(contains(" - lamp: point radius=4.60 camera_inside=false faces=front"));
}

#[test]
fn light_depth_flag_overrides_scene_setting() {
    let scene = write_scene();
    let mut cmd = Command::cargo_bin("deferred-shading").expect("binary exists");
    cmd.arg(scene.path())
        .args(["--summary-only", "--light-depth", "off"]);
    cmd.assert()
        .success()
        .stdout(contains("(light depth: off)"))
        .stdout(contains("faces=back"));
}

#[test]
fn unknown_argument_is_rejected() {
    let mut cmd = Command::cargo_bin("deferred-shading").expect("binary exists");
    cmd.arg("--frobnicate");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --frobnicate"));
}

#[test]
fn bad_light_depth_value_is_rejected() {
    let mut cmd = Command::cargo_bin("deferred-shading").expect("binary exists");
    cmd.args(["--summary-only", "--light-depth", "sometimes"]);
    cmd.assert().failure().stderr(contains("sometimes"));
}

#[test]
fn missing_scene_file_reports_path() {
    let mut cmd = Command::cargo_bin("deferred-shading").expect("binary exists");
    cmd.args(["no/such/scene.xml", "--summary-only"]);
    cmd.assert()
        .failure()
        .stderr(contains("no/such/scene.xml"));
}
