// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-chat settings and named prompts.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};

use mensageiro_core::{ChatConfig, MensageiroError, NamedPrompt};

use crate::database::{Database, map_tr_err, parse_column, to_sql_time};

pub async fn get_config(db: &Database, chat_id: &str) -> Result<Option<ChatConfig>, MensageiroError> {
    let chat_id = chat_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT media_image, media_audio, media_video, description_mode, active_prompt
                 FROM chat_config WHERE chat_id = ?1",
                params![chat_id],
                |row| {
                    let mode: String = row.get(3)?;
                    Ok(ChatConfig {
                        media_image: row.get(0)?,
                        media_audio: row.get(1)?,
                        media_video: row.get(2)?,
                        description_mode: parse_column(3, &mode)?,
                        active_prompt: row.get(4)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn upsert_config(
    db: &Database,
    chat_id: &str,
    config: &ChatConfig,
) -> Result<(), MensageiroError> {
    let chat_id = chat_id.to_string();
    let config = config.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO chat_config (chat_id, media_image, media_audio, media_video,
                    description_mode, active_prompt, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(chat_id) DO UPDATE SET
                    media_image = excluded.media_image,
                    media_audio = excluded.media_audio,
                    media_video = excluded.media_video,
                    description_mode = excluded.description_mode,
                    active_prompt = excluded.active_prompt,
                    updated_at = excluded.updated_at",
                params![
                    chat_id,
                    config.media_image,
                    config.media_audio,
                    config.media_video,
                    config.description_mode.to_string(),
                    config.active_prompt,
                    to_sql_time(&Utc::now()),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_config(db: &Database, chat_id: &str) -> Result<(), MensageiroError> {
    let chat_id = chat_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM chat_config WHERE chat_id = ?1", params![chat_id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_prompt(
    db: &Database,
    chat_id: &str,
    name: &str,
) -> Result<Option<NamedPrompt>, MensageiroError> {
    let chat_id = chat_id.to_string();
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT name, text FROM named_prompts WHERE chat_id = ?1 AND name = ?2",
                params![chat_id, name],
                |row| {
                    Ok(NamedPrompt {
                        name: row.get(0)?,
                        text: row.get(1)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_prompts(db: &Database, chat_id: &str) -> Result<Vec<NamedPrompt>, MensageiroError> {
    let chat_id = chat_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT name, text FROM named_prompts WHERE chat_id = ?1 ORDER BY name ASC",
            )?;
            let rows = stmt.query_map(params![chat_id], |row| {
                Ok(NamedPrompt {
                    name: row.get(0)?,
                    text: row.get(1)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn upsert_prompt(
    db: &Database,
    chat_id: &str,
    prompt: &NamedPrompt,
) -> Result<(), MensageiroError> {
    let chat_id = chat_id.to_string();
    let prompt = prompt.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO named_prompts (chat_id, name, text, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(chat_id, name) DO UPDATE SET
                    text = excluded.text,
                    updated_at = excluded.updated_at",
                params![chat_id, prompt.name, prompt.text, to_sql_time(&Utc::now())],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes a prompt and clears it from the chat's active selection.
pub async fn delete_prompt(db: &Database, chat_id: &str, name: &str) -> Result<bool, MensageiroError> {
    let chat_id = chat_id.to_string();
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            let sql_tx = conn.transaction()?;
            let removed = sql_tx.execute(
                "DELETE FROM named_prompts WHERE chat_id = ?1 AND name = ?2",
                params![chat_id, name],
            )?;
            sql_tx.execute(
                "UPDATE chat_config SET active_prompt = NULL, updated_at = ?3
                 WHERE chat_id = ?1 AND active_prompt = ?2",
                params![chat_id, name, to_sql_time(&Utc::now())],
            )?;
            sql_tx.commit()?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_tr_err)
}
