use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};

use common::error::AppError;

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant who answers using the provided context.";

fn user_prompt(context: &str, question: &str) -> String {
    format!("Context: {context}\n\nQuestion: {question}")
}

/// Ask the chat model to answer a question grounded in retrieved context.
///
/// A response without any message content is `ChatResponseInvalid`.
pub async fn generate_answer(
    client: &Client<OpenAIConfig>,
    model: &str,
    context: &str,
    question: &str,
) -> Result<String, AppError> {
    let request = CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages([
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_prompt(context, question))
                .build()?
                .into(),
        ])
        .build()?;

    let response = client.chat().create(request).await?;

    response
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .ok_or_else(|| {
            AppError::ChatResponseInvalid("no answer content returned by chat model".to_string())
        })
}
