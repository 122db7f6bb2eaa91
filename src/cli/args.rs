// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// bizdesk - business dashboard chat assistant
#[derive(Parser, Debug)]
#[command(name = "bizdesk")]
#[command(version, about = "Business dashboard chat assistant")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings file path (defaults to ~/.bizdesk/settings.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Model to use; the provider is inferred from the name
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Agent to select at startup
    #[arg(short, long, global = true)]
    pub agent: Option<String>,

    /// JSON fixture seeding the in-memory store
    #[arg(long, global = true, value_name = "PATH")]
    pub data: Option<PathBuf>,

    /// Scripted backend reply used instead of a real provider; repeat for more
    #[arg(long, global = true, value_name = "REPLY", action = clap::ArgAction::Append)]
    pub mock: Vec<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start interactive chat session (default when no command given)
    Chat,

    /// Run a single turn (non-interactive)
    Ask(AskArgs),
}

/// Arguments for the ask subcommand
#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The utterance to send
    pub text: String,

    /// Page path the utterance is sent from (e.g. /meeting-notes?meetingId=m1)
    #[arg(long)]
    pub page: Option<String>,
}
