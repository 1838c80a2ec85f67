//! System-instruction composition for the voice agent.
//!
//! The agent is a conversational data gatherer: it interviews the user for the
//! fields a given document type needs and submits them through the single
//! declared tool. It never drafts document content itself; the raw facts go
//! back to the application pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Name of the sole remote-callable tool.
pub const SUBMIT_TOOL: &str = "submit_document_details";

/// The document kinds the drafting application supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    ActivityProposal,
    BudgetaryRequirements,
    Resolution,
    OfficialLetter,
    Constitution,
    MeetingMinutes,
}

impl DocumentType {
    /// Human-readable name, as shown to the model and to users.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::ActivityProposal => "Activity Proposal",
            DocumentType::BudgetaryRequirements => "Budgetary Requirements",
            DocumentType::Resolution => "Resolution",
            DocumentType::OfficialLetter => "Official Letter",
            DocumentType::Constitution => "Constitution & By-Laws",
            DocumentType::MeetingMinutes => "Meeting Minutes",
        }
    }

    /// The interview checklist for this document type.
    fn required_fields(&self) -> &'static str {
        match self {
            DocumentType::ActivityProposal => {
                "\n1. Name of Organization/Proponent\n\
                 2. Activity Title\n\
                 3. Venue\n\
                 4. Date\n\
                 5. Specific Objectives\n\
                 6. Estimated Budget\n\
                 7. Source of Funds"
            }
            DocumentType::OfficialLetter => {
                "\n1. From (Sender Name and Position)\n\
                 2. To (Recipient Name and Position)\n\
                 3. Subject\n\
                 4. Key details to include in the body"
            }
            _ => "the necessary details",
        }
    }

    /// JSON keys the gathered data must use, so the payload maps onto the UI
    /// form without translation.
    fn expected_keys(&self) -> &'static str {
        match self {
            DocumentType::ActivityProposal => {
                "JSON keys to use: \"orgName\", \"title\", \"venue\", \"date\", \
                 \"objectives\", \"budget\", \"source\""
            }
            DocumentType::OfficialLetter => {
                "JSON keys to use: \"senderName\", \"senderPosition\", \
                 \"recipientName\", \"subject\", \"details\""
            }
            _ => "",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compose the full system instruction: persona, interview checklist, tool
/// handoff rules, and any reference material fetched before connect.
pub fn system_instruction(document_type: Option<DocumentType>, reference_block: &str) -> String {
    let doc_label = document_type
        .map(|d| d.as_str().to_string())
        .unwrap_or_else(|| "general documents".to_string());
    let required_fields = document_type
        .map(|d| d.required_fields())
        .unwrap_or("the necessary details");
    let expected_keys = document_type.map(|d| d.expected_keys()).unwrap_or("");

    let mut text = format!(
        "You are the Voice Agent for SmartDraft.\n\
         You help academic users draft formal documents (like {doc_label}).\n\n\
         CRITICAL INITIALIZATION: YOU MUST SPEAK FIRST. Greet the user and identify \
         the document they are trying to create.\n\n\
         YOUR MISSION:\n\
         You are a conversational data gatherer. Your job is to extract the following \
         information interactively from the user, one or two questions at a time:\n\
         {required_fields}\n\n\
         Once you have gathered all details, say \"Great, I have all the details. \
         Generating your document now.\" and IMMEDIATELY call the '{SUBMIT_TOOL}' tool.\n\n\
         TOOL INSTRUCTIONS:\n\
         Pass the gathered information into the 'gatheredData' parameter as a JSON object.\n\
         Ensure you use the correct keys for the data to match the UI form.\n\
         {expected_keys}\n\n\
         Do NOT generate the document content yourself. Just pass the raw facts into the \
         JSON and the main application pipeline will generate the document safely."
    );

    if !reference_block.is_empty() {
        text.push_str("\n\nREFERENCE MATERIAL:\n");
        text.push_str(reference_block);
    }

    text
}

/// Declaration of the one tool the model may call. `gatheredData` is a
/// free-form object: required fields vary by document type, so no fixed
/// schema is declared.
pub fn submit_tool_declaration() -> Value {
    json!({
        "name": SUBMIT_TOOL,
        "description": "Submits the gathered document details to the application. \
                        Call this ONLY when all necessary details have been collected.",
        "parameters": {
            "type": "OBJECT",
            "properties": {
                "gatheredData": {
                    "type": "OBJECT",
                    "description": "A flat JSON object containing the gathered form fields \
                                    as key-value pairs. Use concise, descriptive keys \
                                    (e.g., {\"title\": \"...\", \"venue\": \"...\"})."
                }
            },
            "required": ["gatheredData"]
        }
    })
}
