//! Results aggregation.
//!
//! Results are recomputed from the stored responses on every call.

use std::collections::HashMap;

use livepoll_common::AppResult;
use livepoll_db::{
    entities::{
        participant,
        poll::{self, PollStatus, PollType},
        poll_option, response,
    },
    repositories::{ParticipantRepository, PollRepository, ResponseRepository, SessionRepository},
};
use serde::Serialize;
use tracing::debug;

use crate::services::response::ResponsePayload;
use crate::services::session::ensure_owner;

/// Count for one option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionTally {
    pub option_id: String,
    pub position: i32,
    pub text: String,
    pub count: u64,
}

/// One open-ended answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnswer {
    pub participant_id: String,
    pub name: String,
    pub email: String,
    pub text: String,
}

/// Per-type result body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResultSet {
    /// Single- and multiple-choice polls.
    Choice { options: Vec<OptionTally> },
    /// Open-ended polls.
    OpenEnded { answers: Vec<TextAnswer> },
}

/// Results of a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResults {
    pub poll_id: String,
    pub question: String,
    #[serde(rename = "type")]
    pub poll_type: PollType,
    pub status: PollStatus,
    pub total_respondents: u64,
    #[serde(flatten)]
    pub results: ResultSet,
}

/// Results service.
#[derive(Clone)]
pub struct ResultsService {
    poll_repo: PollRepository,
    session_repo: SessionRepository,
    response_repo: ResponseRepository,
    participant_repo: ParticipantRepository,
}

impl ResultsService {
    /// Create a new results service.
    #[must_use]
    pub const fn new(
        poll_repo: PollRepository,
        session_repo: SessionRepository,
        response_repo: ResponseRepository,
        participant_repo: ParticipantRepository,
    ) -> Self {
        Self {
            poll_repo,
            session_repo,
            response_repo,
            participant_repo,
        }
    }

    /// Aggregate the current responses of a poll the host owns.
    pub async fn get_results(&self, poll_id: &str, host_id: &str) -> AppResult<PollResults> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        let session = self.session_repo.get_by_id(&poll.session_id).await?;
        ensure_owner(&session, host_id)?;

        let responses = self.response_repo.find_by_poll(&poll.id).await?;

        let results = if poll.poll_type.has_options() {
            let options = self.poll_repo.find_options(&poll.id).await?;
            tally_choices(&options, &responses)
        } else {
            let ids: Vec<String> = responses.iter().map(|r| r.participant_id.clone()).collect();
            let participants = self.participant_repo.find_by_ids(&ids).await?;
            collect_answers(&responses, &participants)
        };

        Ok(build(&poll, responses.len(), results))
    }
}

fn build(poll: &poll::Model, respondents: usize, results: ResultSet) -> PollResults {
    PollResults {
        poll_id: poll.id.clone(),
        question: poll.question.clone(),
        poll_type: poll.poll_type,
        status: poll.status,
        total_respondents: respondents as u64,
        results,
    }
}

/// Count responses per option.
///
/// Every option appears, in position order, even with no votes. A
/// multiple-choice response adds one to each option it selects.
#[must_use]
pub fn tally_choices(options: &[poll_option::Model], responses: &[response::Model]) -> ResultSet {
    let mut counts: HashMap<&str, u64> = options.iter().map(|o| (o.id.as_str(), 0)).collect();

    for response in responses {
        let Ok(payload) = serde_json::from_value::<ResponsePayload>(response.payload.clone()) else {
            debug!(response_id = %response.id, "Skipping unreadable payload");
            continue;
        };
        for id in payload.option_ids() {
            if let Some(count) = counts.get_mut(id.as_str()) {
                *count += 1;
            }
        }
    }

    let mut tallies: Vec<OptionTally> = options
        .iter()
        .map(|o| OptionTally {
            option_id: o.id.clone(),
            position: o.position,
            text: o.text.clone(),
            count: counts.get(o.id.as_str()).copied().unwrap_or(0),
        })
        .collect();
    tallies.sort_by_key(|t| t.position);

    ResultSet::Choice { options: tallies }
}

/// Pair open-ended answers with who gave them.
#[must_use]
pub fn collect_answers(
    responses: &[response::Model],
    participants: &[participant::Model],
) -> ResultSet {
    let by_id: HashMap<&str, &participant::Model> =
        participants.iter().map(|p| (p.id.as_str(), p)).collect();

    let answers = responses
        .iter()
        .filter_map(|response| {
            let ResponsePayload::Text { text } =
                serde_json::from_value::<ResponsePayload>(response.payload.clone()).ok()?
            else {
                return None;
            };
            let participant = by_id.get(response.participant_id.as_str())?;
            Some(TextAnswer {
                participant_id: participant.id.clone(),
                name: participant.name.clone(),
                email: participant.email.clone(),
                text,
            })
        })
        .collect();

    ResultSet::OpenEnded { answers }
}
