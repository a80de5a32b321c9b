//! entrypoint / command の合成
//!
//! 依存関係マニフェスト（requirements.txt）が指定された場合は、
//! インストール処理と本来のコマンドを1つのシェル呼び出しにまとめる。

use crate::contract::REQUIREMENTS_PATH;
use crate::error::{ConfigurationError, Result};

/// デフォルトのシェル
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// 合成の入力
#[derive(Debug, Clone)]
pub struct CommandSpec<'a> {
    pub entrypoint: Option<&'a str>,
    pub command: Option<&'a str>,
    pub arguments: &'a [String],
    /// 依存関係マニフェスト（ホスト側のパス。存在有無のみ参照する）
    pub dependency_manifest: Option<&'a str>,
    pub shell: &'a str,
}

impl Default for CommandSpec<'_> {
    fn default() -> Self {
        Self {
            entrypoint: None,
            command: None,
            arguments: &[],
            dependency_manifest: None,
            shell: DEFAULT_SHELL,
        }
    }
}

/// 合成結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub entrypoint: Option<String>,
    pub command: Option<String>,
}

/// コンテナ内で依存関係をインストールするコマンド
pub fn install_command() -> String {
    format!("pip install --no-cache-dir -r {}", REQUIREMENTS_PATH)
}

/// ステージの entrypoint / command を決定する
pub fn synthesize(spec: &CommandSpec<'_>) -> Result<ResolvedCommand> {
    let entrypoint = spec.entrypoint.filter(|e| !e.trim().is_empty());
    let command = spec.command.filter(|c| !c.trim().is_empty());

    if spec.dependency_manifest.is_some() {
        if entrypoint.is_none() && command.is_none() {
            return Err(ConfigurationError::NoExecutable);
        }

        let mut parts = vec![install_command(), "&&".to_string()];
        if let Some(entrypoint) = entrypoint {
            parts.push(format!("exec {}", entrypoint));
        }
        parts.extend(command.map(str::to_string));
        parts.extend(spec.arguments.iter().cloned());

        let script = collapse_whitespace(&parts.join(" "));
        return Ok(ResolvedCommand {
            entrypoint: Some(spec.shell.to_string()),
            command: Some(format!("-c {}", single_quote(&script))),
        });
    }

    let mut parts: Vec<&str> = command.into_iter().collect();
    parts.extend(spec.arguments.iter().map(String::as_str));
    let command = collapse_whitespace(&parts.join(" "));

    Ok(ResolvedCommand {
        entrypoint: entrypoint.map(collapse_whitespace),
        command: (!command.is_empty()).then_some(command),
    })
}

/// 連続する空白を1つのスペースにまとめ、前後の空白を除去する
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// POSIX シェルのシングルクォート文字列として囲む
///
/// 内部の `'` は `'\''` に置き換える。
pub fn single_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// POSIX シェルの単語分割（クォートとバックスラッシュのみ）
    fn shell_words(s: &str) -> Option<Vec<String>> {
        let mut words = Vec::new();
        let mut current = String::new();
        let mut in_word = false;
        let mut chars = s.chars();

        while let Some(c) = chars.next() {
            match c {
                '\'' => {
                    in_word = true;
                    loop {
                        match chars.next()? {
                            '\'' => break,
                            other => current.push(other),
                        }
                    }
                }
                '\\' => {
                    in_word = true;
                    current.push(chars.next()?);
                }
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                other => {
                    in_word = true;
                    current.push(other);
                }
            }
        }
        if in_word {
            words.push(current);
        }
        Some(words)
    }

    #[test]
    fn test_plain_command() {
        let args = vec!["--epochs".to_string(), "10".to_string()];
        let resolved = synthesize(&CommandSpec {
            command: Some("python   train.py"),
            arguments: &args,
            ..Default::default()
        })
        .unwrap();

        assert_eq!(resolved.entrypoint, None);
        assert_eq!(
            resolved.command.as_deref(),
            Some("python train.py --epochs 10")
        );
    }

    #[test]
    fn test_entrypoint_is_not_derived_from_command() {
        let resolved = synthesize(&CommandSpec {
            command: Some("python serve.py"),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(resolved.entrypoint, None);
    }

    #[test]
    fn test_explicit_entrypoint_kept() {
        let resolved = synthesize(&CommandSpec {
            entrypoint: Some("python"),
            command: Some("train.py"),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(resolved.entrypoint.as_deref(), Some("python"));
        assert_eq!(resolved.command.as_deref(), Some("train.py"));
    }

    #[test]
    fn test_nothing_to_run_without_manifest() {
        let resolved = synthesize(&CommandSpec::default()).unwrap();
        assert_eq!(resolved, ResolvedCommand::default());
    }

    #[test]
    fn test_manifest_without_executable_fails() {
        let result = synthesize(&CommandSpec {
            dependency_manifest: Some("req.txt"),
            ..Default::default()
        });
        assert!(matches!(result, Err(ConfigurationError::NoExecutable)));
    }

    #[test]
    fn test_manifest_wraps_command() {
        let args = vec!["--fraction".to_string(), "0.1".to_string()];
        let resolved = synthesize(&CommandSpec {
            command: Some("python process.py"),
            arguments: &args,
            dependency_manifest: Some("requirements.txt"),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(resolved.entrypoint.as_deref(), Some("/bin/bash"));
        assert_eq!(
            resolved.command.as_deref(),
            Some(
                "-c 'pip install --no-cache-dir -r /opt/ml/requirements.txt && python process.py --fraction 0.1'"
            )
        );
    }

    #[test]
    fn test_manifest_wraps_entrypoint_with_exec() {
        let resolved = synthesize(&CommandSpec {
            entrypoint: Some("python"),
            command: Some("serve.py"),
            dependency_manifest: Some("requirements.txt"),
            shell: "/bin/sh",
            ..Default::default()
        })
        .unwrap();

        assert_eq!(resolved.entrypoint.as_deref(), Some("/bin/sh"));
        let words = shell_words(resolved.command.as_deref().unwrap()).unwrap();
        assert_eq!(words[0], "-c");
        assert!(words[1].ends_with("&& exec python serve.py"));
    }

    #[test]
    fn test_single_quote_stays_one_shell_literal() {
        let resolved = synthesize(&CommandSpec {
            command: Some(r#"python -c "print('it''s done')""#),
            dependency_manifest: Some("requirements.txt"),
            ..Default::default()
        })
        .unwrap();

        let words = shell_words(resolved.command.as_deref().unwrap()).unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0], "-c");
        assert_eq!(
            words[1],
            r#"pip install --no-cache-dir -r /opt/ml/requirements.txt && python -c "print('it''s done')""#
        );
    }

    #[test]
    fn test_whitespace_collapsed_inside_script() {
        let resolved = synthesize(&CommandSpec {
            command: Some("python\n  train.py\t--lr  0.1"),
            dependency_manifest: Some("requirements.txt"),
            ..Default::default()
        })
        .unwrap();
        assert!(
            resolved
                .command
                .unwrap()
                .ends_with("&& python train.py --lr 0.1'")
        );
    }

    #[test]
    fn test_synthesize_is_deterministic() {
        let args = vec!["--x".to_string(), "it's".to_string()];
        let spec = CommandSpec {
            entrypoint: Some("python"),
            command: Some("run.py"),
            arguments: &args,
            dependency_manifest: Some("requirements.txt"),
            shell: DEFAULT_SHELL,
        };
        assert_eq!(synthesize(&spec).unwrap(), synthesize(&spec).unwrap());
    }
}
