mod fixtures;

use anyhow::Result;
use fixtures::*;
use rstest::*;

#[rstest]
fn test_json_config(mut sandbox: SandboxManager) -> Result<()> {
    sandbox.run(&["--json", "--timeout=120", "config", "timeout", "image"])?;

    let json: serde_json::Value = serde_json::from_str(&sandbox.last_stdout)?;
    assert_eq!(json["status"], "success");
    assert_eq!(json["timeout"], "120");
    assert!(json["image"].as_str().unwrap().starts_with("https://"));

    Ok(())
}

/* Failures still produce a JSON document on stdout, along with a non-zero exit */
#[rstest]
fn test_json_error(mut sandbox: SandboxManager) -> Result<()> {
    let name = sandbox.name.clone();
    assert!(sandbox.xfail(&["--json", "snapshot", &name, "list"]));

    let json: serde_json::Value = serde_json::from_str(&sandbox.last_stdout)?;
    assert_eq!(json["status"], "error");
    assert!(json["error"].as_str().unwrap().contains(&name));

    assert!(sandbox.xfail(&["--json", "config", "no_such_key"]));
    assert!(sandbox.last_stdout.contains("\"status\": \"error\""));

    Ok(())
}
