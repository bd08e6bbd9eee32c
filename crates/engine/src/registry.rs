// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Data-driven tool catalog.
//!
//! The dispatcher is a pure function of this registry: adding a tool is a
//! registry entry plus a handler arm. Mutating tools get ledger rows;
//! proxy-eligible tools may be routed through the verify proxy.

use std::collections::HashMap;

/// Handler selector for a registered tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    // Mutating
    ExecuteSql,
    ApplyMigration,
    GithubPushFiles,
    SandboxExec,
    SandboxWriteFile,
    SandboxPipeline,
    RunTests,
    DeployEdgeFunction,
    // State machine entry points
    MarkComplete,
    MarkFailed,
    TransitionState,
    RequestClarification,
    DelegateSubtask,
    UpdateQaChecklist,
    // Read-only
    GithubReadFile,
    GithubReadFileRange,
    ReadFullFile,
    GithubListFiles,
    GithubSearchCode,
    GithubGrep,
    GithubTree,
    GitLog,
    GitDiff,
    GitBlame,
    ReadTable,
    ReadExecutionLog,
    GetSchema,
    SearchKnowledgeBase,
    SearchLessons,
    RecallMemory,
    QueryOntology,
    QueryObjectLinks,
    QueryPipelineStatus,
    WebFetch,
    CheckClarification,
    CheckChildStatus,
}

/// Registry entry for one tool.
#[derive(Debug, Clone, Copy)]
pub struct ToolDef {
    pub name: &'static str,
    pub kind: ToolKind,
    /// Mutating tools run the permission gate and get ledger rows.
    pub mutating: bool,
    /// Eligible for routing through the verify proxy.
    pub proxy_eligible: bool,
}

/// Named catalog of every tool the dispatcher serves.
pub struct ToolRegistry {
    tools: HashMap<&'static str, ToolDef>,
}

impl ToolRegistry {
    /// The standard catalog.
    pub fn standard() -> Self {
        let defs = [
            // Mutating tools. execute_sql is recorded only for non-SELECT
            // classifications; the handler withholds ledger facts for reads.
            ToolDef { name: "execute_sql", kind: ToolKind::ExecuteSql, mutating: true, proxy_eligible: true },
            ToolDef { name: "apply_migration", kind: ToolKind::ApplyMigration, mutating: true, proxy_eligible: true },
            ToolDef { name: "github_push_files", kind: ToolKind::GithubPushFiles, mutating: true, proxy_eligible: true },
            ToolDef { name: "sandbox_exec", kind: ToolKind::SandboxExec, mutating: true, proxy_eligible: false },
            ToolDef { name: "sandbox_write_file", kind: ToolKind::SandboxWriteFile, mutating: true, proxy_eligible: false },
            ToolDef { name: "sandbox_pipeline", kind: ToolKind::SandboxPipeline, mutating: true, proxy_eligible: false },
            ToolDef { name: "run_tests", kind: ToolKind::RunTests, mutating: true, proxy_eligible: false },
            ToolDef { name: "deploy_edge_function", kind: ToolKind::DeployEdgeFunction, mutating: true, proxy_eligible: true },
            // State-machine entry points: transitions are journaled by the
            // state machine itself, not the mutation ledger.
            ToolDef { name: "mark_complete", kind: ToolKind::MarkComplete, mutating: false, proxy_eligible: false },
            ToolDef { name: "mark_failed", kind: ToolKind::MarkFailed, mutating: false, proxy_eligible: false },
            ToolDef { name: "transition_state", kind: ToolKind::TransitionState, mutating: false, proxy_eligible: false },
            ToolDef { name: "request_clarification", kind: ToolKind::RequestClarification, mutating: false, proxy_eligible: false },
            ToolDef { name: "delegate_subtask", kind: ToolKind::DelegateSubtask, mutating: false, proxy_eligible: false },
            ToolDef { name: "update_qa_checklist", kind: ToolKind::UpdateQaChecklist, mutating: false, proxy_eligible: false },
            // Read-only tools
            ToolDef { name: "github_read_file", kind: ToolKind::GithubReadFile, mutating: false, proxy_eligible: false },
            ToolDef { name: "github_read_file_range", kind: ToolKind::GithubReadFileRange, mutating: false, proxy_eligible: false },
            ToolDef { name: "read_full_file", kind: ToolKind::ReadFullFile, mutating: false, proxy_eligible: false },
            ToolDef { name: "github_list_files", kind: ToolKind::GithubListFiles, mutating: false, proxy_eligible: false },
            ToolDef { name: "github_search_code", kind: ToolKind::GithubSearchCode, mutating: false, proxy_eligible: false },
            ToolDef { name: "github_grep", kind: ToolKind::GithubGrep, mutating: false, proxy_eligible: false },
            ToolDef { name: "github_tree", kind: ToolKind::GithubTree, mutating: false, proxy_eligible: false },
            ToolDef { name: "git_log", kind: ToolKind::GitLog, mutating: false, proxy_eligible: false },
            ToolDef { name: "git_diff", kind: ToolKind::GitDiff, mutating: false, proxy_eligible: false },
            ToolDef { name: "git_blame", kind: ToolKind::GitBlame, mutating: false, proxy_eligible: false },
            ToolDef { name: "read_table", kind: ToolKind::ReadTable, mutating: false, proxy_eligible: false },
            ToolDef { name: "read_execution_log", kind: ToolKind::ReadExecutionLog, mutating: false, proxy_eligible: false },
            ToolDef { name: "get_schema", kind: ToolKind::GetSchema, mutating: false, proxy_eligible: false },
            ToolDef { name: "search_knowledge_base", kind: ToolKind::SearchKnowledgeBase, mutating: false, proxy_eligible: false },
            ToolDef { name: "search_lessons", kind: ToolKind::SearchLessons, mutating: false, proxy_eligible: false },
            ToolDef { name: "recall_memory", kind: ToolKind::RecallMemory, mutating: false, proxy_eligible: false },
            ToolDef { name: "query_ontology", kind: ToolKind::QueryOntology, mutating: false, proxy_eligible: false },
            ToolDef { name: "query_object_links", kind: ToolKind::QueryObjectLinks, mutating: false, proxy_eligible: false },
            ToolDef { name: "query_pipeline_status", kind: ToolKind::QueryPipelineStatus, mutating: false, proxy_eligible: false },
            ToolDef { name: "web_fetch", kind: ToolKind::WebFetch, mutating: false, proxy_eligible: false },
            ToolDef { name: "check_clarification", kind: ToolKind::CheckClarification, mutating: false, proxy_eligible: false },
            ToolDef { name: "check_child_status", kind: ToolKind::CheckChildStatus, mutating: false, proxy_eligible: false },
        ];
        let mut tools = HashMap::with_capacity(defs.len());
        for def in defs {
            tools.insert(def.name, def);
        }
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDef> {
        self.tools.get(name)
    }

    pub fn is_mutating(&self, name: &str) -> bool {
        self.tools.get(name).is_some_and(|d| d.mutating)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.tools.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
