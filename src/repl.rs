//! 行式 REPL 前端
//!
//! 每行输入跑一轮 THINK → EXECUTE → NARRATE：回显用户输入（accent 字、surface 底，按主题对齐），
//! 打印 meta 行，流式输出叙述（text 字、surface_light 底）。叙述期间 Ctrl-C 只停止本轮的流。
//! 命令：/deltas 查看最近状态变化，/quit 退出。

use std::io::{self, Stdout, Write};

use crossterm::{
    queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal,
};
use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::agent::AgentComponents;
use crate::engine::{AgenticEngine, TurnNarration};
use crate::manifest::CognitiveManifest;
use crate::memory::StateDelta;
use crate::tools::theme::Align;
use crate::tools::{Theme, ThemeHandle, ToolExecutor, ToolHandler};

const ERROR_COLOR: Color = Color::Rgb { r: 0xe0, g: 0x6c, b: 0x75 };
const META_COLOR: Color = Color::DarkGrey;

/// `[intent=… tools=… deltas=… rag_queries=…]`
pub fn meta_line(manifest: &CognitiveManifest) -> String {
    format!(
        "[intent={} tools={} deltas={} rag_queries={}]",
        manifest.intent,
        manifest.tool_calls.len(),
        manifest.state_deltas.len(),
        manifest.rag_queries.len()
    )
}

/// 右对齐时按终端宽度左侧补空格；过长的行不补
pub fn align_line(text: &str, align: Align, width: usize) -> String {
    let len = text.chars().count();
    match align {
        Align::Right if len < width => format!("{}{}", " ".repeat(width - len), text),
        _ => text.to_string(),
    }
}

/// 提示符与回显行的 (前景, 背景)
pub fn echo_colors(theme: &Theme) -> (Color, Color) {
    (theme.accent, theme.surface)
}

/// 叙述文字的 (前景, 背景)
pub fn narration_colors(theme: &Theme) -> (Color, Color) {
    (theme.text, theme.surface_light)
}

fn format_delta(d: &StateDelta) -> String {
    format!(
        "turn {}: {} {}/{} = {}",
        d.turn_number, d.action, d.entity_type, d.entity_id, d.value
    )
}

pub struct Repl {
    engine: AgenticEngine,
    tools: ToolExecutor,
    theme: ThemeHandle,
    out: Stdout,
}

impl Repl {
    pub fn new(components: AgentComponents) -> Self {
        Self {
            engine: components.engine,
            tools: components.tools,
            theme: components.theme,
            out: io::stdout(),
        }
    }

    fn theme(&self) -> Theme {
        self.theme.read().map(|t| *t).unwrap_or_default()
    }

    fn print_colored(&mut self, color: Color, text: &str) -> io::Result<()> {
        queue!(self.out, SetForegroundColor(color), Print(text), ResetColor)?;
        self.out.flush()
    }

    fn print_themed(&mut self, (fg, bg): (Color, Color), text: &str) -> io::Result<()> {
        queue!(
            self.out,
            SetForegroundColor(fg),
            SetBackgroundColor(bg),
            Print(text),
            ResetColor
        )?;
        self.out.flush()
    }

    fn println_colored(&mut self, color: Color, text: &str) -> io::Result<()> {
        self.print_colored(color, &format!("{text}\n"))
    }

    /// 读 stdin 直到 EOF、/quit 或空闲时的 Ctrl-C
    pub async fn run(mut self) -> anyhow::Result<()> {
        self.println_colored(
            META_COLOR,
            &format!("narratoria ready (turn {}). /deltas, /quit", self.engine.turn()),
        )?;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let colors = echo_colors(&self.theme());
            self.print_themed(colors, "> ")?;
            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = line else {
                break;
            };
            let input = line.trim();
            match input {
                "" => continue,
                "/quit" => break,
                "/deltas" => self.show_deltas()?,
                _ => {
                    if let Err(e) = self.handle_turn(input).await {
                        tracing::error!(error = %e, "turn failed");
                        self.println_colored(ERROR_COLOR, &format!("error: {e}"))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn show_deltas(&mut self) -> anyhow::Result<()> {
        let deltas = self.engine.recent_deltas()?;
        if deltas.is_empty() {
            self.println_colored(META_COLOR, "(no state deltas yet)")?;
        }
        for d in &deltas {
            self.println_colored(META_COLOR, &format_delta(d))?;
        }
        Ok(())
    }

    async fn handle_turn(&mut self, input: &str) -> anyhow::Result<()> {
        let theme = self.theme();
        let width = terminal::size().map(|(w, _)| w as usize).unwrap_or(80);
        let line = align_line(input, theme.user_align, width);
        self.print_themed(echo_colors(&theme), &line)?;
        self.print_colored(META_COLOR, "\n")?;

        let outcome = self.engine.think(input).await?;
        let manifest = outcome.manifest;
        self.println_colored(META_COLOR, &meta_line(&manifest))?;

        let handler: &dyn ToolHandler = &self.tools;
        let ctx = self.engine.execute(&manifest, Some(handler)).await?;
        let stream = self.engine.narrate(input, &manifest, &ctx).await?;

        // 工具可能刚改了主题
        let colors = narration_colors(&self.theme());
        let narration = self.stream_narration(stream, colors).await?;
        if narration.text.trim().is_empty() {
            self.print_themed(colors, narration.or_summary(&manifest))?;
        }
        self.print_colored(META_COLOR, "\n\n")?;
        if let Some(e) = narration.error {
            self.println_colored(ERROR_COLOR, &format!("(narration interrupted: {e})"))?;
        }
        Ok(())
    }

    async fn stream_narration(
        &mut self,
        mut stream: crate::engine::NarrationStream,
        colors: (Color, Color),
    ) -> io::Result<TurnNarration> {
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        let mut narration = TurnNarration::default();
        loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("narration cancelled by user");
                    break;
                }
                item = stream.next() => item,
            };
            match item {
                Some(Ok(fragment)) => {
                    narration.push(&fragment);
                    if let Err(e) = self.print_themed(colors, &fragment) {
                        watcher.abort();
                        return Err(e);
                    }
                }
                Some(Err(e)) => {
                    narration.error = Some(e);
                    break;
                }
                None => break,
            }
        }
        watcher.abort();
        Ok(narration)
    }
}
