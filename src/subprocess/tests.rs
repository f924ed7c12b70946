use super::*;

fn shell(script: &str) -> ProcessCommand {
    ProcessCommand::new("bash").arg("-c").arg(script)
}

#[test]
fn test_production_runner_success() {
    let output = StdProcessRunner.run(shell("echo hello world")).unwrap();
    assert!(output.status.success());
    assert_eq!(output.stdout.trim(), "hello world");
    assert!(output.stderr.is_empty());
}

#[test]
fn test_production_runner_failure() {
    let output = StdProcessRunner.run(ProcessCommand::new("false")).unwrap();
    assert!(!output.status.success());
    assert_eq!(output.status.code(), 1);
}

#[test]
fn test_production_runner_command_not_found() {
    let result = StdProcessRunner.run(ProcessCommand::new("nonexistent-command-12345"));
    assert!(matches!(result, Err(ProcessError::CommandNotFound(_))));
}

#[test]
fn test_production_runner_feeds_stdin() {
    let command = ProcessCommand::new("bash")
        .arg("-s")
        .stdin("echo from-script\nexit 3\n".to_string());

    let output = StdProcessRunner.run(command).unwrap();
    assert_eq!(output.status, ExitStatus::Error(3));
    assert_eq!(output.stdout.trim(), "from-script");
}

#[test]
fn test_non_utf8_banner_keeps_answer_line() {
    let output = StdProcessRunner
        .run(shell(r"printf 'Willkommen \xfc\n1,2,3,4,5,6,1,7,8,9\n'"))
        .unwrap();

    assert!(output.status.success());
    let mut lines = output.stdout.lines();
    assert!(lines.next().unwrap().starts_with("Willkommen "));
    assert_eq!(lines.next(), Some("1,2,3,4,5,6,1,7,8,9"));
}

#[test]
fn test_signal_status_maps_to_shell_code() {
    assert_eq!(ExitStatus::Signal(9).code(), 137);
    assert_eq!(ExitStatus::Success.code(), 0);
    assert_eq!(ExitStatus::Error(255).code(), 255);
}

#[test]
fn test_remote_shell_command() {
    let options = vec!["-o".to_string(), "BatchMode=yes".to_string()];
    let command = ProcessCommand::remote_shell("ssh", &options, "node-1", "echo hi\n".to_string());

    assert_eq!(command.program, "ssh");
    assert_eq!(command.args, ["-o", "BatchMode=yes", "node-1", "bash -s"]);
    assert_eq!(command.stdin.as_deref(), Some("echo hi\n"));
}

#[test]
fn test_mock_replies_by_host_and_captures_scripts() {
    let mock = MockProcessRunner::new();
    mock.on_host("ssh", "node-1").stdout("1,2,3\n").install();
    mock.on_host("ssh", "node-2").exit_code(255).stderr("refused").install();

    let first = mock
        .run(ProcessCommand::remote_shell("ssh", &[], "node-1", "script-1".to_string()))
        .unwrap();
    let second = mock
        .run(ProcessCommand::remote_shell("ssh", &[], "node-2", "script-2".to_string()))
        .unwrap();

    assert_eq!(first.stdout, "1,2,3\n");
    assert_eq!(second.status.code(), 255);
    assert_eq!(mock.stdin_sent_to("node-1"), vec!["script-1"]);
    assert_eq!(mock.stdin_sent_to("node-2"), vec!["script-2"]);
    assert_eq!(mock.call_count("ssh"), 2);
}

#[test]
fn test_mock_once_and_unscripted_calls() {
    let mock = MockProcessRunner::new();
    mock.on_program("gen").with_args(&["--nodenum", "4"]).once().install();

    let run = |args: &[&str]| mock.run(ProcessCommand::new("gen").args(args));
    assert!(run(&["--nodenum", "4"]).is_ok());
    assert!(matches!(run(&["--nodenum", "4"]), Err(ProcessError::Unscripted(_))));
    assert!(matches!(run(&["--nodenum", "5"]), Err(ProcessError::Unscripted(_))));
    assert_eq!(mock.calls().len(), 3);
}

#[test]
fn test_subprocess_manager_shares_runner() {
    let manager = SubprocessManager::production();
    let output = manager.runner().run(ProcessCommand::new("true")).unwrap();
    assert!(output.status.success());
}
