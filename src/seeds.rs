//! Built-in reference data: the default achievement catalog and a sample problem
//! so the app is useful without any external config.

use crate::achievements::AchievementDef;
use crate::domain::{Difficulty, Rarity, RequirementType};
use crate::problems::ProblemDef;

fn achievement(
  name: &str,
  description: &str,
  icon: &str,
  category: &str,
  requirement_type: RequirementType,
  requirement_value: u32,
  points: u32,
  rarity: Rarity,
) -> AchievementDef {
  AchievementDef {
    name: name.into(),
    description: description.into(),
    icon: icon.into(),
    category: category.into(),
    requirement_type,
    requirement_value,
    points,
    rarity,
    is_active: true,
  }
}

pub fn default_achievements() -> Vec<AchievementDef> {
  use RequirementType::*;
  vec![
    achievement("Primeiro Passo", "Complete seu primeiro exercício", "play", "progress", ExercisesCompleted, 1, 10, Rarity::Common),
    achievement("Dedicado", "Estude por 3 dias consecutivos", "calendar", "streak", StreakDays, 3, 25, Rarity::Common),
    achievement("Persistente", "Estude por 7 dias consecutivos", "target", "streak", StreakDays, 7, 50, Rarity::Rare),
    achievement("Maratonista", "Estude por 30 dias consecutivos", "trophy", "streak", StreakDays, 30, 200, Rarity::Legendary),
    achievement("Praticante", "Complete 10 exercícios", "book-open", "progress", ExercisesCompleted, 10, 30, Rarity::Common),
    achievement("Estudioso", "Complete 50 exercícios", "brain", "progress", ExercisesCompleted, 50, 100, Rarity::Rare),
    achievement("Mestre", "Complete 100 exercícios", "star", "progress", ExercisesCompleted, 100, 250, Rarity::Epic),
    achievement("Colecionador de Pontos", "Acumule 1000 pontos", "zap", "points", TotalPoints, 1000, 100, Rarity::Rare),
    achievement("Milionário", "Acumule 10000 pontos", "crown", "points", TotalPoints, 10000, 500, Rarity::Legendary),
    achievement("Tempo é Ouro", "Estude por 10 horas no total", "clock", "time", StudyTimeHours, 10, 75, Rarity::Rare),
  ]
}

/// Family-budget problem served when the bank has nothing else.
pub fn sample_problem() -> ProblemDef {
  ProblemDef {
    title: "Orçamento Familiar Inteligente".into(),
    description: "A família Silva tem uma renda mensal de R$ 4.500. Eles querem organizar suas finanças de forma inteligente.\n\n\
      📊 Informações atuais:\n\
      • Gastos fixos (aluguel, contas): R$ 2.200\n\
      • Alimentação: R$ 800\n\
      • Transporte: R$ 400\n\
      • Lazer: R$ 300\n\n\
      🎯 Objetivos:\n\
      • Economizar 20% da renda para emergências\n\
      • Juntar R$ 3.600 para uma viagem em 8 meses\n\n\
      💡 DESAFIO: Crie um plano financeiro completo. É possível atingir ambas as metas? Se não, que ajustes você sugere?"
      .into(),
    category: "personal_finance".into(),
    difficulty: Difficulty::Intermediate,
    expected_answer: "Análise financeira com sugestões de ajustes no orçamento".into(),
    hints: vec![
      "💰 Calcule quanto sobra: R$ 4.500 - R$ 3.700 = R$ 800".into(),
      "🎯 Meta emergência: 20% de R$ 4.500 = R$ 900/mês".into(),
      "✈️ Meta viagem: R$ 3.600 ÷ 8 meses = R$ 450/mês".into(),
      "📊 Total necessário: R$ 900 + R$ 450 = R$ 1.350/mês".into(),
      "⚠️ Déficit: R$ 1.350 - R$ 800 = R$ 550/mês".into(),
      "🔧 Sugestão: Reduzir lazer para R$ 150 e otimizar outros gastos".into(),
    ],
    resources: vec![
      "Calculadora de orçamento familiar".into(),
      "Dicas de economia doméstica".into(),
      "Planilha de controle financeiro".into(),
    ],
    is_active: true,
  }
}
